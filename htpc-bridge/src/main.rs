/**
 * HTPC BRIDGE - Moteur côté télécommande
 *
 * RÔLE : Orchestration des modules : config, polling matériel, cache,
 * connectivité, traduction de commandes, Wake-on-LAN.
 *
 * FONCTIONNEMENT :
 * - Charge la DeviceConfig (un seul hôte par instance)
 * - Boucle de polling 5s vers le moniteur matériel (port 8085)
 * - Commandes traduites puis envoyées à l'agent (port 8086) ou traitées
 *   localement (magic packet, sélection de vue)
 * - La plateforme de télécommande consomme l'EntitySet et les vues ;
 *   cette frontière est un collaborateur, pas le coeur du pont
 */

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use htpc_bridge::config::DeviceConfig;
use htpc_bridge::context::BridgeContext;
use htpc_bridge::poller;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    info!("HTPC Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let cfg = DeviceConfig::load().await;
    if !cfg.is_configured() {
        info!("No host configured yet; run the setup flow to create the config file");
    } else {
        info!(
            "Managing host {} (monitoring: {}, wake-on-lan: {})",
            cfg.host,
            cfg.monitoring_enabled,
            cfg.wol_enabled()
        );
    }

    let ctx = BridgeContext::new(cfg);

    let entities = ctx.entity_set();
    info!(
        "Entity set: {} commands, {} monitoring views",
        entities.simple_commands.len(),
        entities.sources.len()
    );

    // polling en tâche de fond, arrêt propre via watch channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = poller::spawn_poller(ctx.clone(), shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, letting in-flight work finish");
    shutdown_tx.send(true).ok();
    poller.await.ok();

    Ok(())
}
