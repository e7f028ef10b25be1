use std::time::Duration;

use actix_cors::Cors;
use clap::Parser;
use system::RelayPolicy;

use crate::server::ServerOptions;

#[derive(Debug, Clone, Parser)]
#[command(name = "coderoom", about = "Relays live code edits between clients sharing a room")]
pub struct Config {
    /// Address the HTTP and WebSocket listener binds to.
    #[arg(long, env = "CODEROOM_BIND", default_value = "127.0.0.1:3033")]
    pub bind: String,

    /// Frames buffered per connection before a slow client is dropped.
    #[arg(long, env = "CODEROOM_CONNECTION_BUFFER", default_value_t = 64)]
    pub connection_buffer: usize,

    /// Commands buffered in front of the relay task.
    #[arg(long, env = "CODEROOM_SERVER_QUEUE", default_value_t = 256)]
    pub server_queue: usize,

    /// Largest accepted JSON body and WebSocket frame.
    #[arg(long, env = "CODEROOM_MAX_PAYLOAD_BYTES", default_value_t = 1_048_576)]
    pub max_payload_bytes: usize,

    /// Drop rooms nobody has joined for this long. Rooms live forever when unset.
    #[arg(long, env = "CODEROOM_ROOM_IDLE_TTL_SECS")]
    pub room_idle_ttl_secs: Option<u64>,

    #[arg(long, env = "CODEROOM_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Only accept edits from connections joined to the edited room.
    #[arg(long, env = "CODEROOM_REQUIRE_MEMBERSHIP")]
    pub require_membership: bool,

    /// Origins allowed by CORS. Any origin is allowed when none is given.
    #[arg(
        long = "allowed-origin",
        env = "CODEROOM_ALLOWED_ORIGIN",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            queue_capacity: self.server_queue,
            connection_buffer: self.connection_buffer,
            max_frame_size: self.max_payload_bytes,
            policy: RelayPolicy {
                require_membership: self.require_membership,
            },
            idle_ttl: self.room_idle_ttl_secs.map(Duration::from_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn cors(&self) -> Cors {
        if self.allowed_origins.is_empty() {
            return Cors::permissive();
        }
        self.allowed_origins.iter().fold(
            Cors::default()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            |cors, origin| cors.allowed_origin(origin),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = Config::try_parse_from(["coderoom"]).expect("defaults parse");
        assert_eq!(config.bind, "127.0.0.1:3033");
        let options = config.server_options();
        assert!(options.idle_ttl.is_none());
        assert!(!options.policy.require_membership);
        assert_eq!(options.connection_buffer, 64);
        assert_eq!(options.max_frame_size, 1_048_576);
    }

    #[test]
    fn it_reads_flags() {
        let config = Config::try_parse_from([
            "coderoom",
            "--bind",
            "0.0.0.0:8080",
            "--room-idle-ttl-secs",
            "600",
            "--sweep-interval-secs",
            "30",
            "--require-membership",
            "--allowed-origin",
            "http://localhost:3000,https://pens.example",
        ])
        .expect("flags parse");
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://pens.example"]
        );
        let options = config.server_options();
        assert_eq!(options.idle_ttl, Some(Duration::from_secs(600)));
        assert_eq!(options.sweep_interval, Duration::from_secs(30));
        assert!(options.policy.require_membership);
    }
}
