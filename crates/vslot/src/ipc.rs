use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use vslot_common::{IpcCommand, IpcReply};

pub type ClientId = u64;

pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    clients: HashMap<ClientId, IpcClient>,
    next_client_id: ClientId,
}

struct IpcClient {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
    /// Bytes of a command whose newline has not arrived yet.
    pending: String,
}

impl IpcServer {
    pub fn bind(socket_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        log::info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            clients: HashMap::new(),
            next_client_id: 0,
        })
    }

    pub fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        log::warn!("Failed to set IPC client non-blocking: {}", e);
                        continue;
                    }

                    let id = self.next_client_id;
                    self.next_client_id += 1;

                    let reader = BufReader::new(match stream.try_clone() {
                        Ok(s) => s,
                        Err(e) => {
                            log::warn!("Failed to clone stream: {}", e);
                            continue;
                        }
                    });

                    self.clients.insert(
                        id,
                        IpcClient {
                            stream,
                            reader,
                            pending: String::new(),
                        },
                    );
                    log::debug!("IPC client {} connected", id);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("IPC accept error: {}", e);
                    break;
                }
            }
        }
    }

    /// Reads every complete command line that is available. Lines that do
    /// not parse are answered with an error straight away.
    pub fn poll_commands(&mut self) -> Vec<(ClientId, IpcCommand)> {
        let mut commands = Vec::new();
        let mut invalid = Vec::new();
        let mut disconnected = Vec::new();

        for (&id, client) in &mut self.clients {
            loop {
                match client.reader.read_line(&mut client.pending) {
                    Ok(0) => {
                        disconnected.push(id);
                        break;
                    }
                    Ok(_) => {
                        if !client.pending.ends_with('\n') {
                            continue;
                        }
                        let line = std::mem::take(&mut client.pending);
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<IpcCommand>(line) {
                            Ok(cmd) => commands.push((id, cmd)),
                            Err(e) => {
                                log::warn!("Invalid IPC command from {}: {}", id, e);
                                invalid.push((id, IpcReply::error("invalid_command", e.to_string())));
                            }
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        log::warn!("IPC read error from {}: {}", id, e);
                        disconnected.push(id);
                        break;
                    }
                }
            }
        }

        for (id, reply) in invalid {
            self.reply(id, &reply);
        }
        for id in disconnected {
            self.clients.remove(&id);
            log::debug!("IPC client {} disconnected", id);
        }

        commands
    }

    pub fn reply(&mut self, id: ClientId, reply: &IpcReply) {
        let json = match serde_json::to_string(reply) {
            Ok(j) => j,
            Err(e) => {
                log::warn!("Failed to serialize IPC reply: {}", e);
                return;
            }
        };

        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let msg = format!("{}\n", json);
        if let Err(e) = client.stream.write_all(msg.as_bytes()) {
            log::warn!("Failed to send to IPC client {}: {}", id, e);
            self.clients.remove(&id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::time::{Duration, Instant};

    fn socket_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("vslot-test-{}-{}.sock", tag, std::process::id()))
    }

    fn poll_until<T>(server: &mut IpcServer, mut f: impl FnMut(&mut IpcServer) -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            server.accept_connections();
            if let Some(v) = f(server) {
                return v;
            }
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_command_and_reply_round_trip() {
        let path = socket_path("roundtrip");
        let mut server = IpcServer::bind(&path).unwrap();

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"{\"type\":\"get_slot_count\"}\n").unwrap();

        let (id, cmd) = poll_until(&mut server, |s| s.poll_commands().pop());
        assert_eq!(cmd, IpcCommand::GetSlotCount);
        server.reply(id, &IpcReply::Count { count: 3 });

        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).unwrap();
        assert_eq!(line.trim(), r#"{"type":"count","count":3}"#);

        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn test_command_split_across_writes() {
        let path = socket_path("split");
        let mut server = IpcServer::bind(&path).unwrap();

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"{\"type\":\"get_sl").unwrap();
        poll_until(&mut server, |s| (s.client_count() == 1).then_some(()));
        std::thread::sleep(Duration::from_millis(20));
        assert!(server.poll_commands().is_empty());

        client.write_all(b"ot_count\"}\n").unwrap();
        let (id, cmd) = poll_until(&mut server, |s| s.poll_commands().pop());
        assert_eq!(cmd, IpcCommand::GetSlotCount);

        // The first half must not have produced an error reply.
        server.reply(id, &IpcReply::Ok);
        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).unwrap();
        assert_eq!(line.trim(), r#"{"type":"ok"}"#);
    }

    #[test]
    fn test_garbage_gets_error_reply() {
        let path = socket_path("garbage");
        let mut server = IpcServer::bind(&path).unwrap();

        let mut client = UnixStream::connect(&path).unwrap();
        client.write_all(b"not json\n").unwrap();
        poll_until(&mut server, |s| {
            s.poll_commands();
            (s.client_count() == 1).then_some(())
        });

        let mut line = String::new();
        BufReader::new(client).read_line(&mut line).unwrap();
        let reply: IpcReply = serde_json::from_str(line.trim()).unwrap();
        assert!(matches!(reply, IpcReply::Error { ref kind, .. } if kind == "invalid_command"));
    }
}
