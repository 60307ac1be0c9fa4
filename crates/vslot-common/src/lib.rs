pub mod ipc;
pub mod logging;
pub mod paths;

pub use ipc::{
    ipc_socket_path, HostDisplayEvent, IpcCommand, IpcReply, SlotSummary, TouchAction, TouchPoint,
};
pub use logging::{AppLogger, FileLogger};
pub use paths::{config_dir, data_dir, vslot_config_dir, vslot_data_dir, vslot_log_dir};
