use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::error::FleetResult;
use crate::load_balancer::{HealthUpdate, InstanceInfo, PoolStats, StrategyKind};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub strategy: String,
    pub pool: PoolStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddedInstance {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemovedInstance {
    pub removed: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBatchResult {
    pub applied: usize,
    pub not_found: Vec<String>,
}

/// Pool counts plus the bounds and thresholds the health loop reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolView {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub min: usize,
    pub max: usize,
    pub scale_up_cpu: f64,
    pub scale_down_cpu: f64,
}

/// Partial update; omitted fields keep their current value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PoolUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_instances: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_up_cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_cpu: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StrategyUpdate {
    pub strategy: StrategyKind,
}

fn pool_view(state: &AdminState) -> PoolView {
    let stats = state.registry.stats();
    let limits = state.registry.limits();
    PoolView {
        total: stats.total,
        active: stats.active,
        inactive: stats.inactive,
        min: stats.min,
        max: stats.max,
        scale_up_cpu: limits.scale_up_cpu,
        scale_down_cpu: limits.scale_down_cpu,
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        strategy: state.strategy.name().to_string(),
        pool: state.registry.stats(),
    })
}

pub async fn list_instances(State(state): State<AdminState>) -> Json<Vec<InstanceInfo>> {
    Json(
        state
            .registry
            .all_instances()
            .iter()
            .map(|instance| instance.info())
            .collect(),
    )
}

pub async fn add_instance(
    State(state): State<AdminState>,
) -> FleetResult<(StatusCode, Json<AddedInstance>)> {
    let instance = state.registry.spawn_instance().await?;
    Ok((
        StatusCode::CREATED,
        Json(AddedInstance {
            id: instance.id().to_string(),
        }),
    ))
}

pub async fn remove_instance(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> FleetResult<Json<RemovedInstance>> {
    state.registry.remove_instance(&id)?;
    Ok(Json(RemovedInstance { removed: id }))
}

pub async fn update_health(
    State(state): State<AdminState>,
    Json(updates): Json<Vec<HealthUpdate>>,
) -> Json<HealthBatchResult> {
    let not_found = state.registry.apply_health_batch(&updates);
    Json(HealthBatchResult {
        applied: updates.len() - not_found.len(),
        not_found,
    })
}

pub async fn get_pool(State(state): State<AdminState>) -> Json<PoolView> {
    Json(pool_view(&state))
}

pub async fn update_pool(
    State(state): State<AdminState>,
    Json(update): Json<PoolUpdate>,
) -> FleetResult<Json<PoolView>> {
    let mut limits = state.registry.limits();
    if let Some(min) = update.min_instances {
        limits.min_instances = min;
    }
    if let Some(max) = update.max_instances {
        limits.max_instances = max;
    }
    if let Some(up) = update.scale_up_cpu {
        limits.scale_up_cpu = up;
    }
    if let Some(down) = update.scale_down_cpu {
        limits.scale_down_cpu = down;
    }

    state.registry.set_limits(limits)?;
    Ok(Json(pool_view(&state)))
}

pub async fn update_strategy(
    State(state): State<AdminState>,
    Json(update): Json<StrategyUpdate>,
) -> Json<SystemStatus> {
    state
        .strategy
        .replace(update.strategy.build(&state.strategy_config));
    get_status(State(state)).await
}
