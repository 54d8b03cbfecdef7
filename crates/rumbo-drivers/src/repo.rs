//! Driver persistence.
//!
//! Expected schema (migrations are managed outside this service):
//!
//! ```sql
//! CREATE TABLE conductores (
//!     id_conductor               UUID PRIMARY KEY,
//!     nombre_completo            TEXT NOT NULL,
//!     email                      TEXT NOT NULL UNIQUE,
//!     telefono                   TEXT NOT NULL UNIQUE,
//!     activo                     BOOLEAN NOT NULL DEFAULT TRUE,
//!     estado_validacion_general  TEXT NOT NULL DEFAULT 'pendiente',
//!     estado_disponibilidad      TEXT NOT NULL DEFAULT 'no_disponible',
//!     en_servicio_desde          TIMESTAMPTZ,
//!     id_pedido_activo           UUID,
//!     asignacion_confirmada      BOOLEAN NOT NULL DEFAULT FALSE
//! );
//!
//! CREATE TABLE vehiculos_conductor (
//!     id_vehiculo   UUID PRIMARY KEY,
//!     id_conductor  UUID NOT NULL
//!         REFERENCES conductores (id_conductor) ON DELETE CASCADE,
//!     placa         TEXT NOT NULL UNIQUE,
//!     activo        BOOLEAN NOT NULL DEFAULT FALSE
//! );
//! ```

use rumbo_core::{DriverId, OrderId};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Availability, DriverRecord};

const CANDIDATE_COLUMNS: &str = r"
    id_conductor, nombre_completo, email, telefono, activo,
    estado_validacion_general, estado_disponibilidad,
    en_servicio_desde, id_pedido_activo, asignacion_confirmada
";

/// Fetch a driver by id.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn get_driver(
    pool: &PgPool,
    driver_id: DriverId,
) -> Result<Option<DriverRecord>, sqlx::Error> {
    sqlx::query_as::<_, DriverRecord>(&format!(
        "SELECT {CANDIDATE_COLUMNS} FROM conductores WHERE id_conductor = $1"
    ))
    .bind(driver_id.as_uuid())
    .fetch_optional(pool)
    .await
}

/// All dispatch candidates, capped.
///
/// The candidacy predicate in SQL form: active account, approved
/// validation, `disponible` availability.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn candidates(pool: &PgPool, cap: i64) -> Result<Vec<DriverRecord>, sqlx::Error> {
    sqlx::query_as::<_, DriverRecord>(&format!(
        r"
        SELECT {CANDIDATE_COLUMNS} FROM conductores
        WHERE activo
          AND estado_validacion_general = 'aprobado'
          AND estado_disponibilidad = 'disponible'
        LIMIT $1
        "
    ))
    .bind(cap)
    .fetch_all(pool)
    .await
}

/// The atomic availability flip of the acceptance protocol.
///
/// Compare-and-set `disponible → en_servicio`, stamping the acceptance
/// bookkeeping in the same statement. Returns `false` when the driver was
/// no longer `disponible` — they were dispatched elsewhere or went off
/// shift between the eligibility check and this write.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn try_begin_service(
    pool: &PgPool,
    driver_id: DriverId,
    order_id: OrderId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE conductores
        SET estado_disponibilidad = 'en_servicio',
            en_servicio_desde = NOW(),
            id_pedido_activo = $2,
            asignacion_confirmada = FALSE
        WHERE id_conductor = $1 AND estado_disponibilidad = 'disponible'
        ",
    )
    .bind(driver_id.as_uuid())
    .bind(order_id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Compensating rollback of [`try_begin_service`].
///
/// Only touches the row if the driver is still `en_servicio`, so a
/// late-arriving rollback can never clobber a newer state.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn revert_to_available(pool: &PgPool, driver_id: DriverId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE conductores
        SET estado_disponibilidad = 'disponible',
            en_servicio_desde = NULL,
            id_pedido_activo = NULL,
            asignacion_confirmada = FALSE
        WHERE id_conductor = $1 AND estado_disponibilidad = 'en_servicio'
        ",
    )
    .bind(driver_id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Explicit availability change from the driver (`/me/status`).
///
/// Leaving `en_servicio` clears the assignment bookkeeping.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn set_availability(
    pool: &PgPool,
    driver_id: DriverId,
    availability: Availability,
) -> Result<Option<DriverRecord>, sqlx::Error> {
    sqlx::query_as::<_, DriverRecord>(&format!(
        r"
        UPDATE conductores
        SET estado_disponibilidad = $2,
            en_servicio_desde = CASE WHEN $2 = 'en_servicio' THEN NOW() ELSE NULL END,
            id_pedido_activo = CASE WHEN $2 = 'en_servicio' THEN id_pedido_activo ELSE NULL END,
            asignacion_confirmada = CASE WHEN $2 = 'en_servicio' THEN asignacion_confirmada
                                         ELSE FALSE END
        WHERE id_conductor = $1
        RETURNING {CANDIDATE_COLUMNS}
        "
    ))
    .bind(driver_id.as_uuid())
    .bind(availability.as_str())
    .fetch_optional(pool)
    .await
}

/// Plate of the driver's active vehicle, if one is registered.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn active_plate(pool: &PgPool, driver_id: DriverId) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r"
        SELECT placa FROM vehiculos_conductor
        WHERE id_conductor = $1 AND activo
        LIMIT 1
        ",
    )
    .bind(driver_id.as_uuid())
    .fetch_optional(pool)
    .await
}

/// Mark a driver's pending assignment as confirmed by the orders service.
///
/// Matches on both the driver and the order so a stale confirmation for an
/// older order cannot confirm a newer acceptance.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn confirm_assignment(
    pool: &PgPool,
    driver_id: DriverId,
    order_id: OrderId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE conductores
        SET asignacion_confirmada = TRUE
        WHERE id_conductor = $1
          AND id_pedido_activo = $2
          AND estado_disponibilidad = 'en_servicio'
        ",
    )
    .bind(driver_id.as_uuid())
    .bind(order_id.as_uuid())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// The watchdog sweep: flip every driver stuck `en_servicio` with an
/// unconfirmed assignment older than the grace period back to `disponible`.
///
/// Returns the ids of the drivers that were reset.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn reset_stale_unconfirmed(
    pool: &PgPool,
    grace_secs: f64,
) -> Result<Vec<DriverId>, sqlx::Error> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        r"
        UPDATE conductores
        SET estado_disponibilidad = 'disponible',
            en_servicio_desde = NULL,
            id_pedido_activo = NULL,
            asignacion_confirmada = FALSE
        WHERE estado_disponibilidad = 'en_servicio'
          AND asignacion_confirmada = FALSE
          AND en_servicio_desde < NOW() - make_interval(secs => $1)
        RETURNING id_conductor
        ",
    )
    .bind(grace_secs)
    .fetch_all(pool)
    .await?;

    debug!(reset_count = rows.len(), "watchdog sweep complete");
    Ok(rows.into_iter().map(DriverId::from).collect())
}
