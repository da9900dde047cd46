//! Wake-on-LAN.
//!
//! Le seul chemin de commande qui ne passe pas par l'agent : par définition
//! l'hôte est éteint quand on l'utilise. Best-effort, aucun accusé de
//! réception possible.

use anyhow::{anyhow, Context, Result};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use tracing::info;

/// Standard WoL discard port.
const WOL_PORT: u16 = 9;

/// Accepte "18-C0-4D-8F-29-06" comme "18:C0:4D:8F:29:06".
fn parse_mac(mac: &str) -> Result<[u8; 6]> {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() != 12 {
        return Err(anyhow!("Invalid MAC address: {mac}"));
    }
    let mut out = [0u8; 6];
    for i in 0..6 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| anyhow!("Invalid MAC address: {mac}"))?;
    }
    Ok(out)
}

/// 6 x 0xFF puis l'adresse MAC répétée 16 fois.
fn magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut pkt = [0u8; 102];
    for byte in pkt.iter_mut().take(6) {
        *byte = 0xFF;
    }
    for i in 0..16 {
        let base = 6 + i * 6;
        pkt[base..base + 6].copy_from_slice(&mac);
    }
    pkt
}

/// Broadcast the magic packet. "Ok" means the datagram left the socket,
/// nothing more.
pub fn send_magic_packet(mac_text: &str) -> Result<()> {
    let mac = parse_mac(mac_text)?;
    let pkt = magic_packet(mac);

    let socket = UdpSocket::bind(("0.0.0.0", 0)).context("Cannot bind UDP socket")?;
    socket
        .set_broadcast(true)
        .context("Cannot enable broadcast")?;

    let addr = SocketAddrV4::new(Ipv4Addr::BROADCAST, WOL_PORT);
    socket
        .send_to(&pkt, addr)
        .with_context(|| format!("WoL send to {addr} failed"))?;

    info!("Magic packet sent for {mac_text}");
    Ok(())
}
