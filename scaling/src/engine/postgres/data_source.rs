use async_trait::async_trait;
use pg_escape::quote_identifier;
use scaling_config::shared::DataSourceConfig;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::any::Any;
use std::str::FromStr;
use std::sync::Arc;

use crate::datasource::{
    ColumnMetadata, DataSource, DataSourceFactory, DataType, TableMetadata, downcast_data_source,
};
use crate::error::{ErrorKind, ScalingError, ScalingResult};

/// A lazily connected `sqlx` pool on a Postgres database.
#[derive(Debug)]
pub struct PgDataSource {
    config: DataSourceConfig,
    pool: PgPool,
}

impl PgDataSource {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the Postgres data source behind `data_source`.
    pub fn downcast(data_source: &dyn DataSource) -> ScalingResult<&PgDataSource> {
        downcast_data_source::<PgDataSource>(data_source)
    }
}

#[async_trait]
impl DataSource for PgDataSource {
    fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    async fn ping(&self) -> ScalingResult<()> {
        sqlx::query("select 1").execute(&self.pool).await?;

        Ok(())
    }

    async fn table_metadata(&self, table_name: &str) -> ScalingResult<Option<TableMetadata>> {
        let exists: bool = sqlx::query_scalar("select to_regclass($1) is not null")
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }

        // Primary key columns carry their position in the key, every other column null.
        let rows: Vec<(String, String, Option<i32>)> = sqlx::query_as(
            r#"
            select a.attname::text,
                   format_type(a.atttypid, a.atttypmod),
                   array_position(i.indkey::int2[], a.attnum)
            from pg_attribute a
            left join pg_index i on i.indrelid = a.attrelid and i.indisprimary
            where a.attrelid = to_regclass($1)
              and a.attnum > 0
              and not a.attisdropped
            order by a.attnum
            "#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        let mut primary_keys = Vec::new();
        let mut columns = Vec::with_capacity(rows.len());
        for (name, type_name, key_position) in rows {
            if let Some(key_position) = key_position {
                primary_keys.push((key_position, name.clone()));
            }
            columns.push(ColumnMetadata {
                name,
                data_type: DataType::from_pg_type_name(&type_name),
            });
        }
        primary_keys.sort();

        Ok(Some(TableMetadata {
            name: table_name.to_owned(),
            columns,
            primary_keys: primary_keys.into_iter().map(|(_, name)| name).collect(),
        }))
    }

    async fn primary_key_range(
        &self,
        table_name: &str,
        column_name: &str,
    ) -> ScalingResult<Option<(i64, i64)>> {
        let query = format!(
            "select min({column})::int8, max({column})::int8 from {table}",
            column = quote_identifier(column_name),
            table = quote_qualified_name(table_name),
        );
        let (min, max): (Option<i64>, Option<i64>) =
            sqlx::query_as(&query).fetch_one(&self.pool).await?;

        Ok(min.zip(max))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Quotes every part of a possibly schema qualified table name.
fn quote_qualified_name(table_name: &str) -> String {
    table_name
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Creates [`PgDataSource`]s. Pools connect on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDataSourceFactory;

impl DataSourceFactory for PgDataSourceFactory {
    fn create(&self, config: &DataSourceConfig) -> ScalingResult<Arc<dyn DataSource>> {
        let mut options = PgConnectOptions::from_str(&config.url).map_err(|err| {
            ScalingError::from(err)
                .with_kind(ErrorKind::InvalidConfiguration, "Invalid PostgreSQL url")
        })?;
        if let Some(username) = &config.username {
            options = options.username(username);
        }
        if let Some(password) = &config.password {
            options = options.password(password.expose_secret());
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);

        Ok(Arc::new(PgDataSource {
            config: config.clone(),
            pool,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::POSTGRESQL;

    #[test]
    fn quotes_schema_qualified_names() {
        assert_eq!(quote_qualified_name("shop.orders"), "shop.orders");
        assert_eq!(quote_qualified_name("Sales.Orders"), r#""Sales"."Orders""#);
    }

    #[tokio::test]
    async fn rejects_malformed_urls() {
        let config = DataSourceConfig::new(POSTGRESQL, "not a url");

        let err = PgDataSourceFactory.create(&config).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn creates_pools_without_connecting() {
        let config = DataSourceConfig::new(POSTGRESQL, "postgres://localhost:1/scaling");

        let data_source = PgDataSourceFactory.create(&config).unwrap();

        assert!(PgDataSource::downcast(data_source.as_ref()).is_ok());
        data_source.close().await;
        assert!(
            PgDataSource::downcast(data_source.as_ref())
                .unwrap()
                .pool()
                .is_closed()
        );
    }
}
