//! Maps IPC commands onto slot table calls.

use vslot_common::{HostDisplayEvent, IpcCommand, IpcReply, SlotSummary};

use crate::error::SlotError;
use crate::headless::HeadlessHost;
use crate::host::DisplayState;
use crate::input::{PointerAction, PointerEvent};
use crate::placement::{LayoutMode, Region};
use crate::slot::SlotInfo;
use crate::table::SlotTable;

impl From<SlotInfo> for SlotSummary {
    fn from(info: SlotInfo) -> Self {
        SlotSummary {
            index: info.index.get(),
            name: info.name,
            width: info.mode.width,
            height: info.mode.height,
            density_dpi: info.mode.density_dpi,
            mirror: info.mirror,
            visible: info.visible,
            state: info.state.name().to_string(),
            display_id: info.display_id,
        }
    }
}

impl From<SlotError> for IpcReply {
    fn from(e: SlotError) -> Self {
        IpcReply::error(e.kind(), e.to_string())
    }
}

fn ok_or_error(result: Result<(), SlotError>) -> IpcReply {
    match result {
        Ok(()) => IpcReply::Ok,
        Err(e) => e.into(),
    }
}

pub struct Controller {
    table: SlotTable,
    host: Option<std::sync::Arc<HeadlessHost>>,
}

impl Controller {
    pub fn new(table: SlotTable) -> Self {
        Self { table, host: None }
    }

    /// Lets `host_display` commands drive the headless host display.
    pub fn with_headless_host(mut self, host: std::sync::Arc<HeadlessHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    pub fn handle(&self, command: IpcCommand) -> IpcReply {
        log::debug!("[control] {:?}", command);
        match command {
            IpcCommand::CreateSlot {
                width,
                height,
                visible,
            } => match self.table.create_slot_with_visibility(width, height, visible) {
                Ok(index) => IpcReply::Slot { slot: index.get() },
                Err(e) => e.into(),
            },
            IpcCommand::CreateMirrorSlot {
                primary,
                width,
                height,
            } => match self.table.create_mirror_slot(primary, width, height) {
                Ok(index) => IpcReply::Slot { slot: index.get() },
                Err(e) => e.into(),
            },
            IpcCommand::Relayout {
                mode,
                left,
                right,
                bottom,
                top,
                scale,
            } => {
                let region = Region {
                    left,
                    right,
                    bottom,
                    top,
                };
                ok_or_error(self.table.relayout(LayoutMode(mode), region, scale))
            }
            IpcCommand::Resize {
                slot,
                width,
                height,
            } => ok_or_error(self.table.resize(slot, width, height)),
            IpcCommand::Hide { slot } => ok_or_error(self.table.hide(slot)),
            IpcCommand::Show { slot } => ok_or_error(self.table.show(slot)),
            IpcCommand::Dismiss { slot } => ok_or_error(self.table.dismiss(slot)),
            IpcCommand::DismissAll => ok_or_error(self.table.dismiss_all()),
            IpcCommand::GetSlotCount => IpcReply::Count {
                count: self.table.slot_count(),
            },
            IpcCommand::LookupMirror { name } => {
                match self.table.lookup_display_id_for_mirror(&name) {
                    Ok(index) => IpcReply::Slot { slot: index.get() },
                    Err(e) => e.into(),
                }
            }
            IpcCommand::GetState => IpcReply::State {
                slots: self.table.slots().into_iter().map(SlotSummary::from).collect(),
            },
            IpcCommand::Touch {
                slot,
                action,
                pointers,
            } => {
                let event = PointerEvent::new(
                    PointerAction::from(action),
                    pointers.into_iter().map(Into::into).collect(),
                );
                ok_or_error(self.table.deliver_touch(slot, event))
            }
            IpcCommand::SetGestureMode { slot, enabled } => {
                ok_or_error(self.table.set_gesture_mode(slot, enabled))
            }
            IpcCommand::ResetTransform { slot } => ok_or_error(self.table.reset_transform(slot)),
            IpcCommand::HostDisplay(event) => self.host_display(event),
        }
    }

    fn host_display(&self, event: HostDisplayEvent) -> IpcReply {
        let Some(host) = &self.host else {
            return IpcReply::error("unsupported", "host display is not controllable");
        };
        let id = host.info().map(|info| info.id).unwrap_or(0);

        match event {
            HostDisplayEvent::Added => ok_or_error(self.table.host_display_added(id)),
            HostDisplayEvent::Changed { state } => match DisplayState::parse(&state) {
                Some(state) => {
                    host.set_state(state);
                    ok_or_error(self.table.host_display_changed(id))
                }
                None => IpcReply::error("invalid_state", format!("unknown display state {:?}", state)),
            },
            HostDisplayEvent::Removed => ok_or_error(self.table.host_display_removed(id)),
        }
    }
}
