pub mod binary_out;
pub mod copy;
pub mod ids;
pub mod irrf;
pub mod network;
pub mod pwm;
pub mod serv_manager;
pub mod set_ch;
pub mod system;
pub mod template;
pub mod uart;
pub mod wildcard;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::gpio::{ExtendedPin, GpioDriver};
use crate::model::{Registry, ServiceIndex};
use crate::scheduler::Scheduler;

pub use binary_out::BinaryOutEntry;
pub use copy::CopyEntry;
pub use irrf::IrRfEntry;
pub use network::NetworkEntry;
pub use pwm::PwmEntry;
pub use serv_manager::ServManagerEntry;
pub use set_ch::SetChEntry;
pub use system::SystemEntry;
pub use uart::UartEntry;
pub use wildcard::WildcardAction;

/// One tick's worth of worker-task spacing (spec.md §4.1 step 7: "tasks
/// start spaced by one tick to limit bursty contention").
pub const WORKER_TASK_SPACING: Duration = Duration::from_millis(50);

/// One action id's worth of side-effect lists (spec.md §6: "Each action
/// entry may contain sub-arrays for copy/binary-out/serv-manager/system/
/// network/irrf/uart/pwm/set-ch"). Copy entries live on [`ActionList`]
/// itself, not here, since copy indirection rewrites the id before this
/// table is even consulted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionEntries {
    pub binary_out: Vec<BinaryOutEntry>,
    pub serv_manager: Vec<ServManagerEntry>,
    pub system: Vec<SystemEntry>,
    pub pwm: Vec<PwmEntry>,
    pub set_ch: Vec<SetChEntry>,
    pub network: Vec<NetworkEntry>,
    pub irrf: Vec<IrRfEntry>,
    pub uart: Vec<UartEntry>,
}

/// A service's full action table: the copy-indirection list plus every
/// action id's entry lists (spec.md §4.1, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionList {
    pub copy: Vec<CopyEntry>,
    pub by_id: HashMap<i32, ActionEntries>,
}

impl ActionList {
    pub fn entry(&mut self, action_id: i32) -> &mut ActionEntries {
        self.by_id.entry(action_id).or_default()
    }
}

/// Side effects recorded by dispatch but applied outside the borrow of
/// [`Registry`] (spec.md §9 "Cooperative tasks": the many `xTaskCreate`
/// call sites collapse into a single worker queue backed by the timer
/// service). Shared via `Rc<RefCell<_>>` so inching and worker-task
/// callbacks armed on the [`Scheduler`] can push into it without holding a
/// borrow of the dispatch context across a timer fire.
#[derive(Default)]
pub struct PendingEffects {
    pub gpio_writes: Vec<(ExtendedPin, bool)>,
    pub network: Vec<ScheduledTask<network::NetworkRequestTask>>,
    pub irrf: Vec<ScheduledTask<irrf::IrRfTask>>,
    pub uart: Vec<ScheduledTask<uart::UartTask>>,
    pub system: Vec<system::SystemEntry>,
}

/// A worker task queued for a service, not runnable before `ready_at`
/// (spec.md §4.1 step 7 one-tick spacing).
pub struct ScheduledTask<T> {
    pub service: ServiceIndex,
    pub ready_at: Instant,
    pub task: T,
}

pub type SharedEffects = Rc<RefCell<PendingEffects>>;

/// Everything `dispatch()` and its sub-steps need. Borrowed fresh for each
/// call; nothing here outlives one `dispatch()` invocation except `pending`
/// and `scheduler`, which are owned by the runtime.
pub struct DispatchContext<'a> {
    pub registry: &'a mut Registry,
    pub scheduler: &'a mut Scheduler,
    pub gpio: &'a mut dyn GpioDriver,
    pub pending: SharedEffects,
    pub now: Instant,
}

/// Runs the seven-step dispatch contract of spec.md §4.1. Idempotent in the
/// sense described there: it reads the current model and enqueues side
/// effects, it never blocks.
pub fn dispatch(ctx: &mut DispatchContext, service: ServiceIndex, action_id: i32) {
    let resolved = {
        let svc = ctx.registry.service(service);
        copy::resolve(&svc.actions, action_id)
    };

    let entries = match ctx.registry.service(service).actions.by_id.get(&resolved) {
        Some(e) => e.clone(),
        None => return,
    };

    binary_out::apply(ctx, &entries.binary_out);
    serv_manager::apply(ctx, service, &entries.serv_manager);
    system::apply(ctx, &entries.system);
    pwm::apply(ctx, &entries.pwm);
    set_ch::apply(ctx, &entries.set_ch);
    enqueue_worker_tasks(ctx, service, &entries);
}

/// Step 7: enqueue one short-lived task per nonempty (UART, network, IR/RF)
/// list, each list's tasks spaced one tick apart from the previous.
fn enqueue_worker_tasks(ctx: &mut DispatchContext, service: ServiceIndex, entries: &ActionEntries) {
    let mut pending = ctx.pending.borrow_mut();
    for (i, entry) in entries.network.iter().enumerate() {
        let ready_at = ctx.now + WORKER_TASK_SPACING * i as u32;
        let task = network::build_task(ctx.registry, service, entry);
        pending.network.push(ScheduledTask { service, ready_at, task });
    }
    for (i, entry) in entries.irrf.iter().enumerate() {
        let ready_at = ctx.now + WORKER_TASK_SPACING * i as u32;
        pending.irrf.push(ScheduledTask { service, ready_at, task: irrf::build_task(entry) });
    }
    for (i, entry) in entries.uart.iter().enumerate() {
        let ready_at = ctx.now + WORKER_TASK_SPACING * i as u32;
        pending.uart.push(ScheduledTask { service, ready_at, task: uart::build_task(entry) });
    }
}
