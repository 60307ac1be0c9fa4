use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vslot_common::{
    ipc_socket_path, AppLogger, HostDisplayEvent, IpcCommand, IpcReply, TouchAction, TouchPoint,
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "vslotctl", version, about = "Control the vslot daemon")]
struct Args {
    /// IPC socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Print the raw JSON reply
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a primary slot
    Create {
        width: i32,
        height: i32,
        #[arg(long)]
        hidden: bool,
    },
    /// Create the mirror of a primary slot
    Mirror { primary: u8, width: i32, height: i32 },
    /// Place every slot using a layout mode
    Relayout {
        mode: u32,
        #[arg(long, default_value_t = 0)]
        left: i32,
        #[arg(long, default_value_t = 1080)]
        right: i32,
        #[arg(long, default_value_t = 2340)]
        bottom: i32,
        #[arg(long, default_value_t = 0)]
        top: i32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },
    Resize { slot: u8, width: i32, height: i32 },
    Hide { slot: u8 },
    Show { slot: u8 },
    Dismiss { slot: u8 },
    DismissAll,
    Count,
    /// Find the mirror slot for a display name
    Lookup { name: String },
    State,
    /// Send a single-pointer touch to a slot's window
    Touch {
        slot: u8,
        action: String,
        x: f32,
        y: f32,
    },
    Gestures {
        slot: u8,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    ResetTransform { slot: u8 },
    /// Simulate a host display event: added, removed or a state name
    Host { event: String },
}

fn parse_touch_action(s: &str) -> Result<TouchAction, String> {
    match s {
        "down" => Ok(TouchAction::Down),
        "move" => Ok(TouchAction::Move),
        "up" => Ok(TouchAction::Up),
        "cancel" => Ok(TouchAction::Cancel),
        other => Err(format!("unknown touch action {:?}", other)),
    }
}

fn to_ipc(command: Command) -> Result<IpcCommand, String> {
    Ok(match command {
        Command::Create {
            width,
            height,
            hidden,
        } => IpcCommand::CreateSlot {
            width,
            height,
            visible: !hidden,
        },
        Command::Mirror {
            primary,
            width,
            height,
        } => IpcCommand::CreateMirrorSlot {
            primary,
            width,
            height,
        },
        Command::Relayout {
            mode,
            left,
            right,
            bottom,
            top,
            scale,
        } => IpcCommand::Relayout {
            mode,
            left,
            right,
            bottom,
            top,
            scale,
        },
        Command::Resize {
            slot,
            width,
            height,
        } => IpcCommand::Resize {
            slot,
            width,
            height,
        },
        Command::Hide { slot } => IpcCommand::Hide { slot },
        Command::Show { slot } => IpcCommand::Show { slot },
        Command::Dismiss { slot } => IpcCommand::Dismiss { slot },
        Command::DismissAll => IpcCommand::DismissAll,
        Command::Count => IpcCommand::GetSlotCount,
        Command::Lookup { name } => IpcCommand::LookupMirror { name },
        Command::State => IpcCommand::GetState,
        Command::Touch { slot, action, x, y } => IpcCommand::Touch {
            slot,
            action: parse_touch_action(&action)?,
            pointers: vec![TouchPoint { id: 0, x, y }],
        },
        Command::Gestures { slot, enabled } => IpcCommand::SetGestureMode { slot, enabled },
        Command::ResetTransform { slot } => IpcCommand::ResetTransform { slot },
        Command::Host { event } => IpcCommand::HostDisplay(match event.as_str() {
            "added" => HostDisplayEvent::Added,
            "removed" => HostDisplayEvent::Removed,
            state => HostDisplayEvent::Changed {
                state: state.to_string(),
            },
        }),
    })
}

fn send(socket: &Path, command: &IpcCommand) -> Result<IpcReply, Box<dyn std::error::Error>> {
    let mut stream = UnixStream::connect(socket)
        .map_err(|e| format!("Failed to connect to {}: {}", socket.display(), e))?;
    stream.set_read_timeout(Some(REPLY_TIMEOUT))?;

    let msg = format!("{}\n", serde_json::to_string(command)?);
    stream.write_all(msg.as_bytes())?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    Ok(serde_json::from_str(line.trim())?)
}

fn print_reply(reply: &IpcReply) {
    match reply {
        IpcReply::Ok => println!("ok"),
        IpcReply::Slot { slot } => println!("{}", slot),
        IpcReply::Count { count } => println!("{}", count),
        IpcReply::State { slots } => {
            if slots.is_empty() {
                println!("no slots");
            }
            for s in slots {
                println!(
                    "{:>2} {:<8} {:>5}x{:<5} {:>4}dpi {:<16} display={} {}{}",
                    s.index,
                    s.name,
                    s.width,
                    s.height,
                    s.density_dpi,
                    s.state,
                    s.display_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    if s.mirror { "mirror" } else { "primary" },
                    if s.visible { "" } else { " hidden" },
                );
            }
        }
        IpcReply::Error { kind, message } => eprintln!("error ({}): {}", kind, message),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Err(e) = AppLogger::init("vslotctl") {
        eprintln!("[vslotctl] logging disabled: {}", e);
    }

    let socket = args.socket.unwrap_or_else(ipc_socket_path);
    let command = to_ipc(args.command)?;
    log::debug!("Sending {:?}", command);

    let reply = send(&socket, &command)?;
    if args.json {
        println!("{}", serde_json::to_string(&reply)?);
    } else {
        print_reply(&reply);
    }

    if let IpcReply::Error { kind, .. } = &reply {
        log::warn!("Command failed: {}", kind);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hidden_maps_visibility() {
        let cmd = to_ipc(Command::Create {
            width: 400,
            height: 800,
            hidden: true,
        })
        .unwrap();
        assert_eq!(
            cmd,
            IpcCommand::CreateSlot {
                width: 400,
                height: 800,
                visible: false
            }
        );
    }

    #[test]
    fn test_host_event_mapping() {
        assert_eq!(
            to_ipc(Command::Host {
                event: "removed".to_string()
            })
            .unwrap(),
            IpcCommand::HostDisplay(HostDisplayEvent::Removed)
        );
        assert_eq!(
            to_ipc(Command::Host {
                event: "doze".to_string()
            })
            .unwrap(),
            IpcCommand::HostDisplay(HostDisplayEvent::Changed {
                state: "doze".to_string()
            })
        );
    }

    #[test]
    fn test_bad_touch_action() {
        assert!(to_ipc(Command::Touch {
            slot: 0,
            action: "wiggle".to_string(),
            x: 0.0,
            y: 0.0
        })
        .is_err());
    }

    #[test]
    fn test_cli_parses() {
        let args = Args::try_parse_from(["vslotctl", "relayout", "1", "--scale", "0.5"]).unwrap();
        match args.command {
            Command::Relayout { mode, scale, right, .. } => {
                assert_eq!((mode, scale, right), (1, 0.5, 1080));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
