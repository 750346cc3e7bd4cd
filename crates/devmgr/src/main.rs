//! devmgrd entry point.
//!
//! Loads the device configuration, binds the software-model platform, adds
//! every configured device and then waits for a shutdown signal. With
//! `--warm-init` each device also goes through one warm-init cycle.

use anyhow::Context;
use clap::Parser;
use sonic_devmgr::audit::{init_logging, init_logging_pretty, AuditCategory, AuditOutcome, AuditRecord};
use sonic_devmgr::{
    audit_log, error_log, info_log, warn_log, DevMgr, DevMgrConfig, SimPlatform,
    DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use std::sync::Arc;

/// SONiC ASIC device lifecycle manager
#[derive(Parser, Debug)]
#[command(name = "devmgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    /// Run one warm-init cycle on every configured device after adding it
    #[arg(long)]
    warm_init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.pretty {
        init_logging_pretty(&args.log_level);
    } else {
        init_logging(&args.log_level);
    }

    info_log!("devmgrd", config = %args.config.display(), "Starting device manager");

    let config = DevMgrConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate().context("validating configuration")?;

    audit_log!(
        AuditRecord::new(AuditCategory::ConfigurationChange, "devmgrd", "load_config")
            .with_outcome(AuditOutcome::Success)
            .with_details(serde_json::json!({
                "path": args.config.display().to_string(),
                "max_dev_count": config.device_manager.max_dev_count,
                "devices": config.devices.len()
            }))
    );

    let mgr = Arc::new(DevMgr::from_config(&config));

    let platform = SimPlatform::new().with_latency(config.platform_latency());
    for entry in &config.devices {
        if let Some(name) = &entry.cpuif_netdev_name {
            platform.set_netdev_name(entry.dev_id, name.clone());
        }
    }
    mgr.register(Arc::new(platform))
        .context("registering platform callbacks")?;

    let worker = {
        let mgr = mgr.clone();
        let config = config.clone();
        let warm_init = args.warm_init;
        tokio::task::spawn_blocking(move || bring_up(&mgr, &config, warm_init))
    };
    let failures = worker.await.context("device bring-up task")?;
    if failures > 0 {
        warn_log!("devmgrd", failures = failures, "Some devices failed to come up");
    }

    for device in mgr.snapshot() {
        info_log!(
            "devmgrd",
            dev_id = device.dev_id,
            state = %device.state,
            error_flag = device.error_flag,
            warm_init_cycles = device.warm_init_cycles,
            "Device status"
        );
    }
    let stats = mgr.stats();
    info_log!(
        "devmgrd",
        device_adds = stats.device_adds,
        warm_init_ends = stats.warm_init_ends,
        callback_failures = stats.callback_failures,
        "Device manager ready"
    );

    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "devmgrd", "start")
        .with_outcome(AuditOutcome::Success));

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;

    warn_log!("devmgrd", "Received SIGINT, shutting down");
    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "devmgrd", "stop")
        .with_outcome(AuditOutcome::Success));

    Ok(())
}

/// Adds each configured device and optionally runs a warm init on it.
/// Returns the number of devices that failed.
fn bring_up(mgr: &DevMgr, config: &DevMgrConfig, warm_init: bool) -> usize {
    let mut failures = 0;

    for entry in &config.devices {
        let dev_id = entry.dev_id;

        if let Err(e) = mgr.device_add(dev_id, Some(&entry.profile)) {
            error_log!("devmgrd", dev_id = dev_id, error = %e, status = %e.status(), "Device add failed");
            failures += 1;
            continue;
        }

        match mgr.cpuif_netdev_name_get(dev_id, bf_pal::ffi::CPUIF_NETDEV_NAME_LEN) {
            Ok(name) => info_log!("devmgrd", dev_id = dev_id, netdev = %name, "CPU interface"),
            Err(e) => warn_log!("devmgrd", dev_id = dev_id, error = %e, "No CPU interface name"),
        }

        if !warm_init {
            continue;
        }

        let result = mgr
            .warm_init_begin(
                dev_id,
                config.warm_init.mode,
                config.warm_init.serdes_upgrade_mode,
                config.warm_init.upgrade_agents,
            )
            .and_then(|()| mgr.warm_init_end(dev_id));

        if let Err(e) = result {
            error_log!("devmgrd", dev_id = dev_id, error = %e, "Warm init failed");
            if let Err(e) = mgr.error_set(dev_id, true) {
                error_log!("devmgrd", dev_id = dev_id, error = %e, "Could not record warm-init error");
            }
            failures += 1;
        }
    }

    failures
}
