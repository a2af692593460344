//! Processor Task - the single consumer of the SDP task queue
//!
//! All SDP state lives in one [`SdpHost`]. The processor takes tasks from the
//! engine's queue one at a time and runs each to completion on the host, so
//! record store changes, client requests, transport events and timer expiries
//! never interleave. Facade calls that expect an answer get it through the
//! engine's completion channel.
//!
//! # Usage
//!
//! Spawn the processor as its own Embassy task, next to the transport glue:
//!
//! ```rust,ignore
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use sdpbird::{SdpEngine, SdpHost, SdpOptions, processor};
//!
//! static ENGINE: SdpEngine<CriticalSectionRawMutex> = SdpEngine::new();
//!
//! #[embassy_executor::task]
//! async fn sdp_task(transport: MyL2cap, timers: MyTimers) -> ! {
//!     let mut host = SdpHost::with_options(transport, timers, SdpOptions::default());
//!     processor::run(&ENGINE, &mut host).await
//! }
//! ```
//!
//! # Architecture
//!
//! * **Facade** (`api`): posts a task, then waits on the completion channel
//! * **Transport and timer glue**: post events without waiting
//! * **Processor** (`run`): executes tasks in post order

use crate::l2cap::L2capTransport;
use crate::timer::TimerService;
use crate::{SdpEngine, SdpHost};
use embassy_sync::blocking_mutex::raw::RawMutex;

/// Run the SDP processor forever
pub async fn run<M: RawMutex, T: L2capTransport, S: TimerService>(
    engine: &SdpEngine<M>,
    host: &mut SdpHost<T, S>,
) -> ! {
    info!("[PROCESSOR] SDP processor started");
    loop {
        let (call, task) = engine.tasks.receive().await;
        let wants_completion = task.wants_completion();
        let completion = host.process_task(task);
        if wants_completion {
            match completion {
                Some(completion) => engine.completions.send((call, completion)).await,
                None => error!("[PROCESSOR] Task produced no completion"),
            }
        }
    }
}
