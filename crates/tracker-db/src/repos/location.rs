//! Location repository. The table is maintained outside the import; the
//! import only reads it into a [`LocationLookup`] once per run.

use tracker_core::LocationLookup;

use crate::error::DatabaseError;
use crate::service::TrackerStore;

impl TrackerStore {
    pub async fn upsert_location(
        &self,
        location_id: i64,
        code: &str,
        name: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.db()
            .conn()
            .execute(
                "INSERT INTO locations (location_id, code, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(location_id) DO UPDATE SET code = ?2, name = ?3",
                libsql::params![location_id, code, name],
            )
            .await?;
        Ok(())
    }

    /// Snapshot the location table for one run.
    pub async fn load_location_lookup(&self) -> Result<LocationLookup, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query("SELECT location_id, code FROM locations", ())
            .await?;
        let mut codes = Vec::new();
        while let Some(row) = rows.next().await? {
            codes.push((row.get::<i64>(0)?, row.get::<String>(1)?));
        }
        Ok(codes.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::helpers::test_store;

    #[tokio::test]
    async fn lookup_reflects_table() {
        let store = test_store().await;
        store.upsert_location(10, "CP", Some("Carmel Valley")).await.unwrap();
        store.upsert_location(20, "OV", None).await.unwrap();
        store.upsert_location(20, "OC", Some("Old Town")).await.unwrap();

        let lookup = store.load_location_lookup().await.unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.code_for(10), Some("CP"));
        assert_eq!(lookup.code_for(20), Some("OC"));
        assert_eq!(lookup.code_for(30), None);
    }
}
