//! Order persistence.
//!
//! Expected schema (migrations are managed outside this service):
//!
//! ```sql
//! CREATE TABLE pedidos (
//!     id_pedido                   UUID PRIMARY KEY,
//!     id_cliente_externo          TEXT,
//!     nombre_cliente              TEXT,
//!     telefono_cliente            TEXT,
//!     tipo_servicio               TEXT NOT NULL,
//!     origen_descripcion          TEXT,
//!     origen_latitud              DOUBLE PRECISION,
//!     origen_longitud             DOUBLE PRECISION,
//!     destino_descripcion         TEXT,
//!     destino_latitud             DOUBLE PRECISION,
//!     destino_longitud            DOUBLE PRECISION,
//!     id_empresa_asociada         TEXT,
//!     detalles_adicionales_pedido TEXT,
//!     metodo_pago_sugerido        TEXT,
//!     monto_estimado_pedido       DOUBLE PRECISION,
//!     estado_pedido               TEXT NOT NULL,
//!     id_conductor_asignado       UUID,
//!     fecha_creacion_pedido       TIMESTAMPTZ NOT NULL,
//!     fecha_ultima_actualizacion  TIMESTAMPTZ NOT NULL,
//!     fecha_asignacion            TIMESTAMPTZ
//! );
//!
//! CREATE TABLE items_pedido (
//!     id_item                     UUID PRIMARY KEY,
//!     id_pedido                   UUID NOT NULL
//!         REFERENCES pedidos (id_pedido) ON DELETE CASCADE,
//!     id_item_menu_empresa        TEXT,
//!     nombre_item                 TEXT NOT NULL,
//!     cantidad                    INTEGER NOT NULL CHECK (cantidad > 0),
//!     precio_unitario_registrado  DOUBLE PRECISION,
//!     notas_item                  TEXT
//! );
//! ```

use chrono::Utc;
use rumbo_core::{DriverId, OrderId, OrderPayload, OrderStatus};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{OrderItemRecord, OrderRecord};

/// Insert a new order with its items in one transaction, state `solicitado`.
///
/// # Errors
///
/// Returns the underlying database error; the transaction is rolled back.
pub async fn create_order(pool: &PgPool, payload: &OrderPayload) -> Result<OrderRecord, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let order_id = OrderId::new();

    let record = sqlx::query_as::<_, OrderRecord>(
        r"
        INSERT INTO pedidos (
            id_pedido, id_cliente_externo, nombre_cliente, telefono_cliente,
            tipo_servicio, origen_descripcion, origen_latitud, origen_longitud,
            destino_descripcion, destino_latitud, destino_longitud,
            id_empresa_asociada, detalles_adicionales_pedido,
            metodo_pago_sugerido, monto_estimado_pedido, estado_pedido,
            fecha_creacion_pedido, fecha_ultima_actualizacion
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $17)
        RETURNING *
        ",
    )
    .bind(order_id.as_uuid())
    .bind(&payload.id_cliente_externo)
    .bind(&payload.nombre_cliente)
    .bind(&payload.telefono_cliente)
    .bind(payload.tipo_servicio.as_str())
    .bind(&payload.origen_descripcion)
    .bind(payload.origen_latitud)
    .bind(payload.origen_longitud)
    .bind(&payload.destino_descripcion)
    .bind(payload.destino_latitud)
    .bind(payload.destino_longitud)
    .bind(&payload.id_empresa_asociada)
    .bind(&payload.detalles_adicionales_pedido)
    .bind(&payload.metodo_pago_sugerido)
    .bind(payload.monto_estimado_pedido)
    .bind(OrderStatus::Solicitado.as_str())
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for item in &payload.items_pedido {
        sqlx::query(
            r"
            INSERT INTO items_pedido (
                id_item, id_pedido, id_item_menu_empresa, nombre_item,
                cantidad, precio_unitario_registrado, notas_item
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(Uuid::new_v4())
        .bind(order_id.as_uuid())
        .bind(&item.id_item_menu_empresa)
        .bind(&item.nombre_item)
        .bind(i64::from(item.cantidad))
        .bind(item.precio_unitario_registrado)
        .bind(&item.notas_item)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    debug!(order_id = %order_id, "order created");
    Ok(record)
}

/// Fetch an order by id.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn get_order(pool: &PgPool, order_id: OrderId) -> Result<Option<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>("SELECT * FROM pedidos WHERE id_pedido = $1")
        .bind(order_id.as_uuid())
        .fetch_optional(pool)
        .await
}

/// Items belonging to an order.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn get_items(
    pool: &PgPool,
    order_id: OrderId,
) -> Result<Vec<OrderItemRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderItemRecord>(
        "SELECT * FROM items_pedido WHERE id_pedido = $1 ORDER BY nombre_item",
    )
    .bind(order_id.as_uuid())
    .fetch_all(pool)
    .await
}

/// Orders in a given status, newest first.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn list_by_status(
    pool: &PgPool,
    status: OrderStatus,
    offset: i64,
    limit: i64,
) -> Result<Vec<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>(
        r"
        SELECT * FROM pedidos
        WHERE estado_pedido = $1
        ORDER BY fecha_creacion_pedido DESC
        OFFSET $2 LIMIT $3
        ",
    )
    .bind(status.as_str())
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Orders assigned to a driver, newest first.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn list_by_driver(
    pool: &PgPool,
    driver_id: DriverId,
    offset: i64,
    limit: i64,
) -> Result<Vec<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>(
        r"
        SELECT * FROM pedidos
        WHERE id_conductor_asignado = $1
        ORDER BY fecha_creacion_pedido DESC
        OFFSET $2 LIMIT $3
        ",
    )
    .bind(driver_id.as_uuid())
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Apply a guarded state transition.
///
/// The write only lands when the row is still in `from`; `None` means
/// another writer got there first (the optimistic read-modify-write check).
/// Assigning `asignado_conductor` also stamps `fecha_asignacion`.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn transition(
    pool: &PgPool,
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
    driver_id: Option<DriverId>,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>(
        r"
        UPDATE pedidos
        SET estado_pedido = $1,
            id_conductor_asignado = COALESCE($2, id_conductor_asignado),
            fecha_ultima_actualizacion = NOW(),
            fecha_asignacion = CASE
                WHEN $1 = 'asignado_conductor' THEN NOW()
                ELSE fecha_asignacion
            END
        WHERE id_pedido = $3 AND estado_pedido = $4
        RETURNING *
        ",
    )
    .bind(to.as_str())
    .bind(driver_id.map(|id| id.as_uuid()))
    .bind(order_id.as_uuid())
    .bind(from.as_str())
    .fetch_optional(pool)
    .await
}

/// Update only the assigned driver, leaving the status untouched.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn set_driver(
    pool: &PgPool,
    order_id: OrderId,
    driver_id: DriverId,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    sqlx::query_as::<_, OrderRecord>(
        r"
        UPDATE pedidos
        SET id_conductor_asignado = $1, fecha_ultima_actualizacion = NOW()
        WHERE id_pedido = $2
        RETURNING *
        ",
    )
    .bind(driver_id.as_uuid())
    .bind(order_id.as_uuid())
    .fetch_optional(pool)
    .await
}
