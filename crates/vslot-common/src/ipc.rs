use serde::{Deserialize, Serialize};

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
    PointerDown,
    PointerUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostDisplayEvent {
    Added,
    Changed { state: String },
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    CreateSlot {
        width: i32,
        height: i32,
        #[serde(default = "default_visible")]
        visible: bool,
    },
    CreateMirrorSlot {
        primary: u8,
        width: i32,
        height: i32,
    },
    Relayout {
        mode: u32,
        left: i32,
        right: i32,
        bottom: i32,
        top: i32,
        scale: f32,
    },
    Resize {
        slot: u8,
        width: i32,
        height: i32,
    },
    Hide {
        slot: u8,
    },
    Show {
        slot: u8,
    },
    Dismiss {
        slot: u8,
    },
    DismissAll,
    GetSlotCount,
    LookupMirror {
        name: String,
    },
    GetState,
    Touch {
        slot: u8,
        action: TouchAction,
        pointers: Vec<TouchPoint>,
    },
    SetGestureMode {
        slot: u8,
        enabled: bool,
    },
    ResetTransform {
        slot: u8,
    },
    HostDisplay(HostDisplayEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub index: u8,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub density_dpi: i32,
    pub mirror: bool,
    pub visible: bool,
    pub state: String,
    pub display_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcReply {
    Ok,
    Slot { slot: u8 },
    Count { count: usize },
    State { slots: Vec<SlotSummary> },
    Error { kind: String, message: String },
}

impl IpcReply {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        IpcReply::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

pub fn ipc_socket_path() -> std::path::PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        std::path::PathBuf::from(runtime_dir).join("vslot.sock")
    } else {
        std::path::PathBuf::from("/tmp").join(format!("vslot-{}.sock", unsafe { libc::getuid() }))
    }
}
