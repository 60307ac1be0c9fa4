//! Single-threaded UI task queue.
//!
//! Every overlay-window mutation is a task posted here and executed in post
//! order on the thread that owns the [`UiLoop`]. Callers never wait for a
//! task to run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use calloop::channel::{self, Channel, Event, Sender};
use calloop::{EventLoop, LoopSignal};

use crate::error::SlotError;
use crate::host::{DisplayId, SurfaceInfo, ViewId};
use crate::input::PointerEvent;
use crate::window::OverlayWindow;

type TaskFn = Box<dyn FnOnce(&mut UiState) + Send>;

struct UiTask {
    label: &'static str,
    cancelled: Option<Arc<AtomicBool>>,
    run: TaskFn,
}

/// Cancels a posted task that has not started yet.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Clone)]
pub struct UiQueue {
    sender: Sender<UiTask>,
}

impl UiQueue {
    fn send(&self, task: UiTask) -> Result<(), SlotError> {
        self.sender.send(task).map_err(|_| SlotError::QueueClosed)
    }

    pub fn post<F>(&self, label: &'static str, task: F) -> Result<(), SlotError>
    where
        F: FnOnce(&mut UiState) + Send + 'static,
    {
        self.send(UiTask {
            label,
            cancelled: None,
            run: Box::new(task),
        })
    }

    pub fn post_cancellable<F>(&self, label: &'static str, task: F) -> Result<TaskHandle, SlotError>
    where
        F: FnOnce(&mut UiState) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.send(UiTask {
            label,
            cancelled: Some(cancelled.clone()),
            run: Box::new(task),
        })?;
        Ok(TaskHandle { cancelled })
    }

    /// Stops the loop once every task posted before this call has run.
    pub fn shutdown(&self) -> Result<(), SlotError> {
        self.post("shutdown", |ui| ui.signal.stop())
    }
}

/// Routes surface-provider callbacks and touch input for one view back onto
/// the UI queue.
#[derive(Clone)]
pub struct SurfaceNotifier {
    queue: UiQueue,
    view: ViewId,
}

impl SurfaceNotifier {
    pub fn new(queue: UiQueue, view: ViewId) -> Self {
        Self { queue, view }
    }

    fn post<F>(&self, label: &'static str, f: F)
    where
        F: FnOnce(&mut OverlayWindow) + Send + 'static,
    {
        let view = self.view;
        let posted = self.queue.post(label, move |ui| match ui.window_mut(view) {
            Some(window) => f(window),
            None => log::debug!("[queue] {} for {} dropped, window gone", label, view),
        });
        if posted.is_err() {
            log::debug!("[queue] {} for {} dropped, queue closed", label, view);
        }
    }

    pub fn surface_available(&self, surface: SurfaceInfo) {
        self.post("surface-available", move |w| w.on_surface_available(surface));
    }

    pub fn surface_destroyed(&self) {
        self.post("surface-destroyed", |w| w.on_surface_destroyed());
    }

    pub fn surface_size_changed(&self, width: i32, height: i32) {
        self.post("surface-size-changed", move |w| w.on_surface_size_changed(width, height));
    }

    pub fn touch(&self, event: PointerEvent) {
        self.post("touch", move |w| w.on_touch(event));
    }
}

/// State owned by the UI thread: every live overlay window.
pub struct UiState {
    windows: HashMap<ViewId, OverlayWindow>,
    processed: u64,
    signal: LoopSignal,
}

impl UiState {
    pub fn insert_window(&mut self, window: OverlayWindow) {
        self.windows.insert(window.view(), window);
    }

    pub fn window_mut(&mut self, view: ViewId) -> Option<&mut OverlayWindow> {
        self.windows.get_mut(&view)
    }

    pub fn remove_window(&mut self, view: ViewId) -> Option<OverlayWindow> {
        self.windows.remove(&view)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn host_display_added(&mut self, id: DisplayId) {
        for window in self.windows.values_mut() {
            window.on_host_display_added(id);
        }
    }

    pub fn host_display_changed(&mut self, id: DisplayId) {
        for window in self.windows.values_mut() {
            window.on_host_display_changed(id);
        }
    }

    pub fn host_display_removed(&mut self, id: DisplayId) {
        for window in self.windows.values_mut() {
            window.on_host_display_removed(id);
        }
    }

    fn run_task(&mut self, task: UiTask) {
        self.processed += 1;
        if task.cancelled.is_some_and(|flag| flag.load(Ordering::Acquire)) {
            log::debug!("[queue] Skipping cancelled task {}", task.label);
            return;
        }
        log::trace!("[queue] Running {}", task.label);
        (task.run)(self);
    }
}

pub struct UiLoop {
    event_loop: EventLoop<'static, UiState>,
    state: UiState,
}

impl UiLoop {
    pub fn new() -> Result<(Self, UiQueue), calloop::Error> {
        let event_loop = EventLoop::<UiState>::try_new()?;
        let (sender, channel): (Sender<UiTask>, Channel<UiTask>) = channel::channel();

        event_loop
            .handle()
            .insert_source(channel, |event, _, state: &mut UiState| match event {
                Event::Msg(task) => state.run_task(task),
                Event::Closed => {
                    log::info!("[queue] All senders gone, stopping UI loop");
                    state.signal.stop();
                }
            })
            .map_err(|e| e.error)?;

        let state = UiState {
            windows: HashMap::new(),
            processed: 0,
            signal: event_loop.get_signal(),
        };

        Ok((Self { event_loop, state }, UiQueue { sender }))
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    /// Runs queued tasks, including ones they post, until the queue is idle.
    pub fn dispatch_pending(&mut self) -> Result<u64, calloop::Error> {
        let start = self.state.processed;
        loop {
            let before = self.state.processed;
            self.event_loop.dispatch(Some(Duration::ZERO), &mut self.state)?;
            if self.state.processed == before {
                break;
            }
        }
        Ok(self.state.processed - start)
    }

    pub fn run(mut self) -> Result<(), calloop::Error> {
        self.event_loop.run(None, &mut self.state, |_| {})
    }

    /// Starts the loop on its own thread and hands back its queue.
    pub fn spawn() -> std::io::Result<(JoinHandle<()>, UiQueue)> {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("vslot-ui".to_string())
            .spawn(move || {
                let (ui, queue) = match UiLoop::new() {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::error!("[queue] Failed to create UI loop: {}", e);
                        return;
                    }
                };
                if tx.send(queue).is_err() {
                    return;
                }
                log::info!("[queue] UI loop running");
                if let Err(e) = ui.run() {
                    log::error!("[queue] UI loop failed: {}", e);
                }
                log::info!("[queue] UI loop stopped");
            })?;

        let queue = rx
            .recv()
            .map_err(|_| std::io::Error::other("UI loop failed to start"))?;
        Ok((handle, queue))
    }
}
