use std::{io, path::PathBuf};

use thiserror::Error;

/// Problems with the run configuration. All of them are fatal and surface before any socket is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid destination address `{0}`")]
    InvalidAddress(String),
    #[error("invalid destination port `{0}`")]
    InvalidPort(String),
    #[error("invalid sensor layout: {0}")]
    InvalidLayout(String),
    #[error("{packet_len} byte packets make {datagram_len} byte datagrams, over the {mtu} byte MTU")]
    ExceedsMtu {
        packet_len: usize,
        datagram_len: usize,
        mtu: usize,
    },
    #[error("cannot read config file {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config file: {0}")]
    ParseFile(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket creation failed: {0}")]
    Create(#[source] io::Error),
    #[error("setting socket option {option} failed: {source}")]
    SetOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("binding local address failed: {0}")]
    Bind(#[source] io::Error),
    #[error("payload of {len} bytes exceeds the {max} byte datagram limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("partial send: {sent} of {expected} bytes accepted")]
    PartialSend { sent: usize, expected: usize },
}
