use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use sf_core::shift::{current_shift, time_left_in_shift};
use sf_core::{MachineDraft, MachineModel, MachinePatch};
use sf_runtime::{init_tracing, spawn_telemetry, watch_card, AppState, DashboardConfig};
use sf_views::{navigation, View};

#[derive(Parser, Debug)]
#[command(
    name = "floor_demo",
    about = "Simulated shop floor: machines, telemetry ticks and the activity log"
)]
struct Args {
    /// JSON config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Telemetry periods to run before exiting.
    #[arg(long, default_value_t = 10)]
    ticks: u32,
    /// Persist the activity log here.
    #[arg(long)]
    log_path: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "op1")]
    user: String,
    #[arg(long, default_value = "1234")]
    password: String,
}

fn sample_machines() -> Vec<MachineDraft> {
    vec![
        MachineDraft {
            name: "Lathe 1".into(),
            model: MachineModel::Star206,
            part_name: "Drive Shaft".into(),
            mc_number: "S-01".into(),
            parts_goal: 400,
            cycle_time: "2m 30s".into(),
            actual_cycle_time: "2m 36s".into(),
            material: "316L".into(),
            material_diameter: "12mm".into(),
            part_length: Some(27.0),
            ..Default::default()
        },
        MachineDraft {
            name: "Lathe 2".into(),
            model: MachineModel::Tsugami206,
            part_name: "Bushing".into(),
            mc_number: "T-02".into(),
            parts_goal: 1200,
            cycle_time: "45s".into(),
            material: "C360 Brass".into(),
            part_length: Some(54.0),
            stock_level: Some(6.0),
            ..Default::default()
        },
        MachineDraft {
            name: "Lathe 3".into(),
            model: MachineModel::Citizen,
            part_name: "Valve Pin".into(),
            mc_number: "C-03".into(),
            cycle_time: "90".into(),
            ..Default::default()
        },
    ]
}

fn build_config(args: &Args) -> Result<DashboardConfig> {
    let mut cfg = match &args.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if args.log_path.is_some() {
        cfg.log_path = args.log_path.clone();
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = build_config(&args)?;
    info!(?cfg, ticks = args.ticks, "floor_demo starting");

    let state = Arc::new(AppState::new(cfg)?);
    let Some(user) = state.login(&args.user, &args.password) else {
        bail!("login failed for `{}`", args.user);
    };
    let menu: Vec<&str> = navigation(user.role).iter().map(View::as_str).collect();
    info!(user = %user.name, role = %user.role, ?menu, "signed in");
    let decision = state.navigate(View::Reports);
    info!(?decision, "reports view");

    let actor = state.actor();
    let ids = {
        let mut registry = state.registry();
        let mut ids = Vec::new();
        for draft in sample_machines() {
            ids.push(registry.add(&actor, draft)?.id);
        }
        let patch = MachinePatch { operator: Some("Sarah QA".into()), ..Default::default() };
        registry.edit(&actor, &ids[2], patch)?;
        ids
    };

    let started = Instant::now();
    let ticker = spawn_telemetry(state.clone());
    let mut card = watch_card(state.clone(), &ids[0]);

    let run_for = state.config().telemetry_period() * args.ticks;
    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);
    let mut paused = false;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            update = card.changed() => {
                let Some(snapshot) = update else { break };
                if snapshot.parts_count >= 3 && !paused {
                    state.registry().toggle_pause(&actor, &ids[2])?;
                    paused = true;
                }
            }
        }
    }

    drop(card);
    drop(ticker);

    let bar_due: Vec<String> = state
        .machines()
        .into_iter()
        .filter(|m| m.stock_level <= 0.0)
        .map(|m| m.id)
        .collect();
    for id in &bar_due {
        state.registry().reset_bar(&actor, id)?;
    }

    let now = chrono::Utc::now();
    for id in &ids {
        if let Some(card) = state.card(id, now) {
            info!(
                title = %card.title,
                status = %card.status,
                parts = card.parts_count,
                oee = card.oee,
                time_left = %card.time_left,
                completion = %card.completion,
                stock = %card.stock,
                "card"
            );
        }
    }

    let mut feed = state.notifications();
    info!(unread = feed.unread_count(), "notifications");
    for entry in feed.visible(1) {
        info!(
            at = %entry.timestamp,
            user = %entry.user,
            action = %entry.action,
            details = %entry.details,
            "activity"
        );
    }
    feed.open();

    let local = chrono::Local::now();
    info!(shift = ?current_shift(&local), left = %time_left_in_shift(&local), "shift");

    let summary = state.fleet_summary();
    println!("{}", serde_json::to_string(&summary)?);
    let metrics = state.metrics().snapshot();
    println!("{}", metrics.to_json_line("floor_demo", Some(started.elapsed())));
    state.logout();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_floor_renders_every_card() {
        let args = Args::parse_from(["floor_demo", "--seed", "7"]);
        let cfg = build_config(&args).unwrap();
        assert_eq!(cfg.seed, Some(7));

        let state = AppState::new(cfg).unwrap();
        state.login(&args.user, &args.password).unwrap();
        let actor = state.actor();
        let ids: Vec<String> = sample_machines()
            .into_iter()
            .map(|draft| state.registry().add(&actor, draft).unwrap().id)
            .collect();

        let now = chrono::Utc::now();
        for id in &ids {
            let card = state.card(id, now).unwrap();
            assert_eq!(&card.machine_id, id);
            assert_eq!(card.parts_count, 0);
        }
    }
}
