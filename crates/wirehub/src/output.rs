use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wirehub_message::MessageReader;
use wirehub_peer::EntityId;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Something the host or a client observed, in printable form.
#[derive(Debug)]
pub enum Event {
    Listening(SocketAddr),
    Connected(EntityId, Option<SocketAddr>),
    Disconnected(EntityId),
    Message {
        receiver: &'static str,
        message: MessageReader,
    },
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    event: &'static str,
    receiver: &'a str,
    type_name: &'a str,
    type_id: String,
    body_size: usize,
    body: String,
    timestamp: String,
}

#[derive(Serialize)]
struct LifecycleOutput {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    addr: Option<String>,
    timestamp: String,
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match event {
        Event::Message { receiver, message } => print_message(message, receiver, format),
        Event::Listening(addr) => print_lifecycle("listening", None, Some(*addr), format),
        Event::Connected(id, addr) => print_lifecycle("connected", Some(*id), *addr, format),
        Event::Disconnected(id) => print_lifecycle("disconnected", Some(*id), None, format),
    }
}

pub fn print_message(message: &MessageReader, receiver: &str, format: OutputFormat) {
    let ty = message.message_type();
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                event: "message",
                receiver,
                type_name: ty.name(),
                type_id: format!("0x{:08x}", ty.id()),
                body_size: message.len(),
                body: body_preview(message),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RECEIVER", "TYPE", "ID", "SIZE", "BODY"])
                .add_row(vec![
                    receiver.to_string(),
                    ty.name().to_string(),
                    format!("0x{:08x}", ty.id()),
                    message.len().to_string(),
                    body_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{receiver} received {ty} size={} body={}",
                message.len(),
                body_preview(message)
            );
        }
        OutputFormat::Raw => print_raw(message.body()),
    }
}

fn print_lifecycle(
    event: &'static str,
    entity: Option<EntityId>,
    addr: Option<SocketAddr>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = LifecycleOutput {
                event,
                entity: entity.map(EntityId::as_u32),
                addr: addr.map(|addr| addr.to_string()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut line = event.to_string();
            if let Some(id) = entity {
                line.push_str(&format!(" {id}"));
            }
            if let Some(addr) = addr {
                line.push_str(&format!(" {addr}"));
            }
            println!("{line}");
        }
        // Raw output carries message bodies only.
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// The body as text when it is exactly one string, otherwise its size.
fn body_preview(message: &MessageReader) -> String {
    let mut peek = message.clone();
    peek.seek(0);
    match peek.read_string() {
        Ok(text) if peek.remaining() == 0 => text,
        _ => format!("<binary {} bytes>", message.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
