use serde_json::Value;

use crate::errors::ModelErrors;

pub const DEFAULT_NAMESPACE: &str = "/";

/// Socket.IO v5 packet as carried inside an Engine.IO `message`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
}

impl SocketPacket {
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            data: None,
        }
    }

    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            id: None,
            name: name.into(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ModelErrors> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ModelErrors::EmptyPacket)?;
        if matches!(kind, '5' | '6') {
            // Binary attachments are never produced by the relay server.
            return Err(ModelErrors::UnsupportedPacketType(kind));
        }
        if !matches!(kind, '0'..='4') {
            return Err(ModelErrors::UnknownPacketType(kind));
        }

        let mut rest = chars.as_str();
        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let namespace = rest[..idx].to_owned();
                    rest = &rest[idx + 1..];
                    namespace
                }
                None => {
                    let namespace = rest.to_owned();
                    rest = "";
                    namespace
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_owned()
        };

        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        let id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|err| ModelErrors::MalformedPacket(format!("bad ack id: {err}")))?,
            )
        } else {
            None
        };
        let rest = &rest[digits..];

        let data: Option<Value> = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        let packet = match kind {
            '0' => SocketPacket::Connect { namespace, data },
            '1' => SocketPacket::Disconnect { namespace },
            '2' => {
                let (name, args) = split_event(data)?;
                SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args,
                }
            }
            '3' => SocketPacket::Ack {
                namespace,
                id: id.ok_or_else(|| ModelErrors::MalformedPacket("ack without id".into()))?,
                args: match data {
                    Some(Value::Array(args)) => args,
                    Some(other) => vec![other],
                    None => Vec::new(),
                },
            },
            _ => SocketPacket::ConnectError {
                namespace,
                data: data.unwrap_or(Value::Null),
            },
        };
        Ok(packet)
    }

    pub fn encode(&self) -> Result<String, ModelErrors> {
        let (kind, id, data) = match self {
            SocketPacket::Connect { data, .. } => ('0', None, data.clone()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event { id, name, args, .. } => {
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                ('2', *id, Some(Value::Array(array)))
            }
            SocketPacket::Ack { id, args, .. } => ('3', Some(*id), Some(Value::Array(args.clone()))),
            SocketPacket::ConnectError { data, .. } => ('4', None, Some(data.clone())),
        };

        let mut out = String::new();
        out.push(kind);
        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&serde_json::to_string(&data)?);
        }
        Ok(out)
    }
}

fn split_event(data: Option<Value>) -> Result<(String, Vec<Value>), ModelErrors> {
    let mut array = match data {
        Some(Value::Array(array)) if !array.is_empty() => array,
        _ => {
            return Err(ModelErrors::MalformedPacket(
                "event body must be a non-empty array".into(),
            ))
        }
    };
    match array.remove(0) {
        Value::String(name) => Ok((name, array)),
        _ => Err(ModelErrors::MalformedPacket(
            "event name must be a string".into(),
        )),
    }
}
