mod db_config;
mod error;
mod init;
mod recorder;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_types::{IncidentRecord, IncidentStatus};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use tokio::sync::OnceCell;
use tracing::warn;

pub use db_config::{DbConfig, Dialect, create_pool, sqlite_file};
pub use error::PersistenceError;
pub use init::init_schema;
pub use recorder::{IncidentRecorder, RecordResult};

/// Where incidents live. The API server writes through it, the reconciler
/// reads open rows and resolves them.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_incident(&self, record: &IncidentRecord) -> Result<(), PersistenceError>;

    async fn insert_notification(&self, record: &IncidentRecord) -> Result<(), PersistenceError>;

    /// Incidents whose status is still open, oldest first.
    async fn open_incidents(&self) -> Result<Vec<IncidentRecord>, PersistenceError>;

    async fn mark_resolved(&self, id: i64) -> Result<(), PersistenceError>;
}

const COLUMNS: &str = "HostName, NumeroSerie, UsoCPU, UsoMemoria, UsoHD, Temperatura, \
     FechaIncidente, estatus, Dominio, IpPublica, Usuario, MAC, Marca, Modelo";

const PLACEHOLDERS: &str = "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?";

#[derive(Clone)]
pub struct Db {
    pool: AnyPool,
    dialect: Dialect,
    timeout: Duration,
    /// Set once the schema bootstrap has succeeded; retried on every
    /// statement until then.
    schema: Arc<OnceCell<()>>,
}

impl Db {
    /// Creates the pool and, for the plain dialect, the tables.
    pub async fn connect(config: &DbConfig) -> Result<Self, PersistenceError> {
        let db = Self::new(create_pool(config)?, config.dialect, config.timeout);
        db.ensure_schema().await?;
        Ok(db)
    }

    /// A store whose schema is bootstrapped by the first statement that
    /// reaches the database.
    pub fn new(pool: AnyPool, dialect: Dialect, timeout: Duration) -> Self {
        Self {
            pool,
            dialect,
            timeout,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Like [`Db::connect`], but a database that is not reachable yet is not
    /// an error: the schema is created once it comes up.
    pub async fn connect_or_defer(config: &DbConfig) -> Result<Self, PersistenceError> {
        let db = Self::new(create_pool(config)?, config.dialect, config.timeout);
        if let Err(e) = db.ensure_schema().await {
            warn!("database not ready at start-up: {e}");
        }
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        self.schema
            .get_or_try_init(|| {
                self.bounded("schema bootstrap", init_schema(&self.pool, self.dialect))
            })
            .await?;
        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn count_incidents(&self) -> Result<i64, PersistenceError> {
        self.count("SELECT COUNT(*) AS n FROM Incidencias").await
    }

    pub async fn count_notifications(&self) -> Result<i64, PersistenceError> {
        self.count("SELECT COUNT(*) AS n FROM Notificaciones").await
    }

    /// Every incident regardless of status, oldest first.
    pub async fn all_incidents(&self) -> Result<Vec<IncidentRecord>, PersistenceError> {
        self.ensure_schema().await?;
        let sql = format!("SELECT id, {COLUMNS} FROM Incidencias ORDER BY id");
        let rows = self
            .bounded("list incidents", sqlx::query(&sql).fetch_all(&self.pool))
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn count(&self, sql: &'static str) -> Result<i64, PersistenceError> {
        self.ensure_schema().await?;
        let row = self
            .bounded("count", sqlx::query(sql).fetch_one(&self.pool))
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    /// One statement, one transaction. The connection goes back to the pool
    /// when the transaction is dropped, whether or not it committed.
    async fn execute_one<'q>(
        &self,
        label: &'static str,
        query: Query<'q, Any, AnyArguments<'q>>,
    ) -> Result<u64, PersistenceError> {
        self.ensure_schema().await?;
        self.bounded(label, async {
            let mut tx = self.pool.begin().await?;
            let done = query.execute(&mut *tx).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(done.rows_affected())
        })
        .await
    }

    async fn bounded<T, F>(&self, label: &'static str, fut: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(PersistenceError::from),
            Err(_) => Err(PersistenceError::Timeout(label)),
        }
    }
}

#[async_trait]
impl IncidentStore for Db {
    async fn insert_incident(&self, record: &IncidentRecord) -> Result<(), PersistenceError> {
        let sql = match self.dialect {
            Dialect::Procedures => format!("CALL Sp_InsertaIncidencia({PLACEHOLDERS})"),
            Dialect::Plain => format!("INSERT INTO Incidencias ({COLUMNS}) VALUES ({PLACEHOLDERS})"),
        };
        self.execute_one("incident insert", bind_record(sqlx::query(&sql), record))
            .await?;
        Ok(())
    }

    async fn insert_notification(&self, record: &IncidentRecord) -> Result<(), PersistenceError> {
        let sql = format!("INSERT INTO Notificaciones ({COLUMNS}) VALUES ({PLACEHOLDERS})");
        self.execute_one("notification insert", bind_record(sqlx::query(&sql), record))
            .await?;
        Ok(())
    }

    async fn open_incidents(&self) -> Result<Vec<IncidentRecord>, PersistenceError> {
        self.ensure_schema().await?;
        let sql = match self.dialect {
            Dialect::Procedures => "CALL Sp_ConsultaIncidencia()".to_string(),
            Dialect::Plain => {
                format!("SELECT id, {COLUMNS} FROM Incidencias WHERE estatus = ? ORDER BY id")
            }
        };
        let mut query = sqlx::query(&sql);
        if self.dialect == Dialect::Plain {
            query = query.bind(IncidentStatus::Open.code());
        }
        let rows = self
            .bounded("open incident query", query.fetch_all(&self.pool))
            .await?;
        rows.iter()
            .map(row_to_record)
            .filter(|r| !matches!(r, Ok(rec) if rec.status != IncidentStatus::Open))
            .collect()
    }

    async fn mark_resolved(&self, id: i64) -> Result<(), PersistenceError> {
        let query = match self.dialect {
            Dialect::Procedures => sqlx::query("CALL Sp_ActualizaStatus(?)").bind(id),
            Dialect::Plain => {
                sqlx::query("UPDATE Incidencias SET estatus = ? WHERE id = ? AND estatus = ?")
                    .bind(IncidentStatus::Resolved.code())
                    .bind(id)
                    .bind(IncidentStatus::Open.code())
            }
        };
        self.execute_one("status update", query).await?;
        Ok(())
    }
}

/// Binds the fourteen incident fields in column order.
fn bind_record<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    r: &'q IncidentRecord,
) -> Query<'q, Any, AnyArguments<'q>> {
    query
        .bind(r.host_name.as_str())
        .bind(r.serial_number.as_str())
        .bind(r.cpu_usage)
        .bind(r.memory_usage)
        .bind(r.disk_usage)
        .bind(r.temperature)
        .bind(r.incident_at.as_str())
        .bind(r.status.code())
        .bind(r.domain.as_str())
        .bind(r.public_ip.as_str())
        .bind(r.user.as_str())
        .bind(r.mac.as_str())
        .bind(r.manufacturer.as_str())
        .bind(r.model.as_str())
}

fn row_to_record(r: &AnyRow) -> Result<IncidentRecord, PersistenceError> {
    let status: i64 = r.try_get("estatus")?;
    Ok(IncidentRecord {
        id: Some(r.try_get("id")?),
        host_name: r.try_get("HostName")?,
        serial_number: r.try_get("NumeroSerie")?,
        cpu_usage: r.try_get("UsoCPU")?,
        memory_usage: r.try_get("UsoMemoria")?,
        disk_usage: r.try_get("UsoHD")?,
        temperature: r.try_get("Temperatura")?,
        incident_at: r.try_get("FechaIncidente")?,
        status: IncidentStatus::from_code(status),
        domain: r.try_get("Dominio")?,
        public_ip: r.try_get("IpPublica")?,
        user: r.try_get("Usuario")?,
        mac: r.try_get("MAC")?,
        manufacturer: r.try_get("Marca")?,
        model: r.try_get("Modelo")?,
    })
}
