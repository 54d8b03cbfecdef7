//! Driver location index.
//!
//! A single geospatial sorted set keyed by driver id. Latest position wins;
//! no history is retained.

use redis::aio::ConnectionManager;
use rumbo_core::{DriverId, LocationData};
use tracing::debug;

use crate::error::SessionStoreError;

/// Default key of the geospatial set.
pub const DEFAULT_GEO_KEY: &str = "driver_locations";

/// Latest-wins geospatial index of driver positions.
#[derive(Clone)]
pub struct LocationIndex {
    conn: ConnectionManager,
    key: String,
}

impl LocationIndex {
    /// Build an index over the given set key.
    #[must_use]
    pub fn new(conn: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    /// Upsert a driver's position. The previous position is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Store`] on a store failure.
    pub async fn update(
        &self,
        driver_id: DriverId,
        location: &LocationData,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GEOADD")
            .arg(&self.key)
            .arg(location.longitude)
            .arg(location.latitude)
            .arg(driver_id.to_string())
            .query_async::<()>(&mut conn)
            .await?;
        debug!(
            driver_id = %driver_id,
            longitude = location.longitude,
            latitude = location.latitude,
            "driver location updated"
        );
        Ok(())
    }

    /// Current `(longitude, latitude)` of a driver, if known.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Store`] on a store failure.
    pub async fn current(
        &self,
        driver_id: DriverId,
    ) -> Result<Option<(f64, f64)>, SessionStoreError> {
        let mut conn = self.conn.clone();
        let positions: Vec<Option<(f64, f64)>> = redis::cmd("GEOPOS")
            .arg(&self.key)
            .arg(driver_id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(positions.into_iter().next().flatten())
    }

    /// Remove a driver from the index (deregistration).
    ///
    /// Returns whether an entry was actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStoreError::Store`] on a store failure.
    pub async fn remove(&self, driver_id: DriverId) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("ZREM")
            .arg(&self.key)
            .arg(driver_id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}

impl std::fmt::Debug for LocationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationIndex")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}