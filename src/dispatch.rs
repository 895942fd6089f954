use crate::mac::{self, MacAddr};
use crate::throttle::{Admission, ThrottleGate};
use crate::wol::{MagicPacket, WolSocket, DEFAULT_BROADCAST_ADDR};
use lazy_static::lazy_static;
use log::{error, info, warn};
use prometheus::{register_int_counter_vec, IntCounterVec};
use serde::Deserialize;
use std::time::Duration;

lazy_static! {
    static ref WAKE_TRIGGERS: IntCounterVec = register_int_counter_vec!(
        "wakegate_triggers_total",
        "Wake trigger outcomes by target hardware address.",
        &["mac", "outcome"]
    )
    .unwrap();
}

const DISPATCH_KEY_PREFIX: &str = "wol:";

fn default_broadcast_addr() -> String {
    DEFAULT_BROADCAST_ADDR.to_string()
}

fn default_cooldown_secs() -> u64 {
    600
}

/// Per-instance settings handed over by the host's config layer.
#[derive(Clone, Debug, Deserialize)]
pub struct WolConfig {
    /// Hardware address of the machine to wake, e.g. "00:11:22:33:44:55".
    pub mac_address: String,
    /// "host:port" to broadcast the magic packet to.
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: String,
    /// Window during which repeat triggers are throttled.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("invalid hardware address {addr:?}: {source}")]
    BadMacAddr {
        addr: String,
        source: mac::ParseError,
    },
    #[error("cannot open broadcast socket for {addr:?}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum TeardownError {
    #[error("broadcast socket already closed")]
    AlreadyStopped,
}

/// Provisioning hook: the host builds the instance from validated config
/// before any trigger is delivered.
pub trait Configurable: Sized {
    fn provision(config: &WolConfig) -> Result<Self, ProvisionError>;
}

/// Teardown hook: the host calls `stop` exactly once when retiring the
/// instance.
pub trait Stoppable {
    fn stop(&mut self) -> Result<(), TeardownError>;
}

/// Request metadata supplied by the host with each trigger, used only for
/// the dispatch log record.
#[derive(Clone, Copy, Debug)]
pub struct TriggerContext<'a> {
    pub remote_addr: &'a str,
    pub host: &'a str,
    pub request_id: &'a str,
}

/// Wake-on-LAN dispatcher for one configured target. Holds the cached magic
/// packet, the broadcast socket, and its own throttle gate.
pub struct Dispatcher {
    key: String,
    mac: MacAddr,
    packet: MagicPacket,
    socket: Option<WolSocket>,
    gate: ThrottleGate,
}

impl Configurable for Dispatcher {
    fn provision(config: &WolConfig) -> Result<Dispatcher, ProvisionError> {
        let mac: MacAddr = config
            .mac_address
            .parse()
            .map_err(|source| ProvisionError::BadMacAddr {
                addr: config.mac_address.clone(),
                source,
            })?;
        let socket =
            WolSocket::open(&config.broadcast_addr).map_err(|source| ProvisionError::Connect {
                addr: config.broadcast_addr.clone(),
                source,
            })?;
        Ok(Dispatcher {
            key: format!("{}{}", DISPATCH_KEY_PREFIX, mac),
            mac,
            packet: MagicPacket::new(mac),
            socket: Some(socket),
            gate: ThrottleGate::new(Duration::from_secs(config.cooldown_secs)),
        })
    }
}

impl Dispatcher {
    pub fn dispatch_key(&self) -> &str {
        &self.key
    }

    /// Handles one trigger event. Consults the throttle gate and, if
    /// admitted, broadcasts the cached magic packet. Never fails the
    /// triggering request: send errors are logged and counted only, and the
    /// host always proceeds with its own processing after this returns.
    pub fn on_trigger(&self, ctx: &TriggerContext) {
        let mac = self.mac.to_string();
        if self.gate.admit(&self.key) == Admission::Suppressed {
            WAKE_TRIGGERS.with_label_values(&[&mac, "suppressed"]).inc();
            return;
        }
        let socket = match &self.socket {
            Some(socket) => socket,
            None => {
                // Stopped instance; the host should no longer deliver
                // triggers here.
                warn!("trigger for {} after stop, dropping", self.key);
                WAKE_TRIGGERS.with_label_values(&[&mac, "stopped"]).inc();
                return;
            }
        };
        info!(
            "waking {host} ({mac}) via {target}, triggered by {remote} request {id}",
            host = ctx.host,
            mac = mac,
            target = socket.target(),
            remote = ctx.remote_addr,
            id = ctx.request_id,
        );
        match socket.send(&self.packet) {
            Ok(()) => WAKE_TRIGGERS.with_label_values(&[&mac, "sent"]).inc(),
            Err(err) => {
                error!("failed to wake {} ({}): {}", ctx.host, mac, err);
                WAKE_TRIGGERS.with_label_values(&[&mac, "send_error"]).inc();
            }
        }
    }
}

impl Stoppable for Dispatcher {
    fn stop(&mut self) -> Result<(), TeardownError> {
        match self.socket.take() {
            Some(_) => Ok(()),
            None => Err(TeardownError::AlreadyStopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatch::*;
    use crate::wol::DEFAULT_BROADCAST_ADDR;
    use std::net::UdpSocket;
    use std::time::Duration;

    fn loopback_config(receiver: &UdpSocket) -> WolConfig {
        WolConfig {
            mac_address: "00:11:22:33:44:55".to_string(),
            broadcast_addr: receiver.local_addr().unwrap().to_string(),
            cooldown_secs: 600,
        }
    }

    fn recv_packet(receiver: &UdpSocket) -> Option<Vec<u8>> {
        let mut buf = [0u8; 256];
        match receiver.recv_from(&mut buf) {
            Ok((n, _)) => Some(buf[..n].to_vec()),
            Err(_) => None,
        }
    }

    fn ctx() -> TriggerContext<'static> {
        TriggerContext {
            remote_addr: "192.0.2.7:55000",
            host: "nas.example",
            request_id: "req-1",
        }
    }

    #[test]
    fn provision_rejects_bad_mac() {
        let config = WolConfig {
            mac_address: "not-a-mac".to_string(),
            broadcast_addr: DEFAULT_BROADCAST_ADDR.to_string(),
            cooldown_secs: 600,
        };
        assert!(matches!(
            Dispatcher::provision(&config),
            Err(ProvisionError::BadMacAddr { .. })
        ));
    }

    #[test]
    fn provision_rejects_bad_target() {
        let config = WolConfig {
            mac_address: "00:11:22:33:44:55".to_string(),
            broadcast_addr: "definitely-not-resolvable.invalid:9".to_string(),
            cooldown_secs: 600,
        };
        assert!(matches!(
            Dispatcher::provision(&config),
            Err(ProvisionError::Connect { .. })
        ));
    }

    #[test]
    fn dispatch_key_is_derived_from_mac() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let dispatcher = Dispatcher::provision(&loopback_config(&receiver)).unwrap();
        assert_eq!(dispatcher.dispatch_key(), "wol:00:11:22:33:44:55");
    }

    #[test]
    fn trigger_sequence_sends_throttles_and_sends_again() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let dispatcher = Dispatcher::provision(&loopback_config(&receiver)).unwrap();

        // First trigger: one 102-byte magic packet for the configured MAC.
        dispatcher.on_trigger(&ctx());
        let packet = recv_packet(&receiver).expect("first trigger should send");
        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xff; 6]);
        assert_eq!(&packet[6..12], &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

        // Second trigger inside the window: suppressed, nothing on the wire.
        dispatcher.on_trigger(&ctx());
        assert_eq!(recv_packet(&receiver), None);

        // Third trigger: admitted again.
        dispatcher.on_trigger(&ctx());
        assert_eq!(recv_packet(&receiver), Some(packet));
    }

    #[test]
    fn send_failure_does_not_propagate() {
        // Destination port 0 makes sendto fail with EINVAL.
        let config = WolConfig {
            mac_address: "00:11:22:33:44:55".to_string(),
            broadcast_addr: "127.0.0.1:0".to_string(),
            cooldown_secs: 600,
        };
        let dispatcher = Dispatcher::provision(&config).unwrap();
        let errors = WAKE_TRIGGERS.with_label_values(&["00:11:22:33:44:55", "send_error"]);
        let before = errors.get();
        dispatcher.on_trigger(&ctx());
        // The trigger returns normally; the failure shows up in the
        // observability counters only.
        assert_eq!(errors.get(), before + 1);
    }

    #[test]
    fn stop_is_exactly_once_and_halts_sends() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut dispatcher = Dispatcher::provision(&loopback_config(&receiver)).unwrap();
        assert!(dispatcher.stop().is_ok());
        assert!(matches!(
            dispatcher.stop(),
            Err(TeardownError::AlreadyStopped)
        ));

        // Admitted trigger after stop must not send or panic.
        dispatcher.on_trigger(&ctx());
        assert_eq!(recv_packet(&receiver), None);
    }
}
