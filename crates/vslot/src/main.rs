use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopSignal};
use clap::Parser;
use log::LevelFilter;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use vslot::headless::HeadlessBackend;
use vslot::ipc::IpcServer;
use vslot::{Config, Controller, SlotError, SlotIndex, SlotTable, UiLoop};
use vslot_common::{ipc_socket_path, FileLogger};

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

#[derive(Parser, Debug)]
#[command(name = "vslotd", version, about = "Virtual display slot daemon")]
struct Args {
    /// Config file to use instead of the usual search path
    #[arg(long)]
    config: Option<PathBuf>,

    /// IPC socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Daemon {
    server: IpcServer,
    controller: Controller,
    signal: LoopSignal,
    reported: HashSet<SlotIndex>,
}

impl Daemon {
    fn poll_ipc(&mut self) {
        if SHUTDOWN.load(Ordering::SeqCst) {
            log::info!("Shutdown requested");
            self.signal.stop();
            return;
        }

        self.server.accept_connections();
        for (client, command) in self.server.poll_commands() {
            let reply = self.controller.handle(command);
            self.server.reply(client, &reply);
        }
    }

    /// Logs each slot that is stuck waiting for its surface, once.
    fn check_stalled(&mut self, timeout: Duration) {
        let stalled: HashSet<SlotIndex> = self
            .controller
            .table()
            .stalled_slots(timeout)
            .into_iter()
            .collect();

        for index in stalled.difference(&self.reported) {
            log::warn!("[watchdog] {}", SlotError::SurfaceUnavailable(*index));
        }
        self.reported = stalled;
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = args.log_level.parse().unwrap_or(LevelFilter::Info);
    FileLogger::init(level)?;

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => Config::load(),
    };

    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }

    let backend = HeadlessBackend::new(config.host_display_info(), true);
    let (ui_thread, queue) = UiLoop::spawn()?;
    let table = SlotTable::new(backend.services(), queue.clone(), config.table_options());
    let controller = Controller::new(table.clone()).with_headless_host(backend.host.clone());

    let socket = args.socket.unwrap_or_else(ipc_socket_path);
    let server = IpcServer::bind(&socket)?;

    let mut event_loop: EventLoop<Daemon> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    let poll_interval = config.poll_interval();
    handle
        .insert_source(Timer::from_duration(poll_interval), move |_, _, daemon| {
            daemon.poll_ipc();
            TimeoutAction::ToDuration(poll_interval)
        })
        .map_err(|e| e.error)?;

    if let Some(timeout) = config.surface_timeout() {
        handle
            .insert_source(Timer::from_duration(WATCHDOG_INTERVAL), move |_, _, daemon| {
                daemon.check_stalled(timeout);
                TimeoutAction::ToDuration(WATCHDOG_INTERVAL)
            })
            .map_err(|e| e.error)?;
    }

    let mut daemon = Daemon {
        server,
        controller,
        signal: event_loop.get_signal(),
        reported: HashSet::new(),
    };

    log::info!(
        "vslotd ready: host {}x{} @{}dpi",
        config.host.width,
        config.host.height,
        config.host.density_dpi
    );
    event_loop.run(None, &mut daemon, |_| {})?;

    if let Err(e) = table.dismiss_all() {
        log::warn!("Failed to dismiss slots: {}", e);
    }
    if queue.shutdown().is_ok() && ui_thread.join().is_err() {
        log::error!("UI thread panicked");
    }
    log::info!("vslotd stopped");
    Ok(())
}
