//! PostgreSQL implementation of the person store.
//!
//! ## Key Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - One `sqlx::Transaction` per unit of work, rolled back on drop
//! - Upsert by id with `ON CONFLICT DO UPDATE`
//!
//! ## Database Tables
//!
//! - `persons`: one row per person, address columns inlined

use async_trait::async_trait;
use chrono::NaiveDate;
use person_search_shared::{Address, GeoPoint, Person};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, Postgres, Row};
use tracing::{debug, info};

use crate::config::PostgresStoreConfig;
use crate::errors::StoreError;
use crate::interfaces::{PersonStore, PersonTransaction};

const SELECT_PERSON: &str = r#"
    SELECT id, name, date_of_birth, gender, children,
           country, countrycode, city, zipcode, latitude, longitude
    FROM persons
    WHERE id = $1
"#;

/// PostgreSQL implementation of the person store.
pub struct PostgresPersonStore {
    pool: sqlx::PgPool,
}

impl PostgresPersonStore {
    /// Creates a store on top of an existing pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool; call [`Self::migrate`] if the
    ///   schema may be missing
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool using `config`.
    pub async fn connect(config: &PostgresStoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL person store"
        );

        Ok(Self { pool })
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PersonStore for PostgresPersonStore {
    async fn begin(&self) -> Result<Box<dyn PersonTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresPersonTransaction { tx }))
    }
}

/// An open PostgreSQL transaction. Dropping it without commit rolls it back.
struct PostgresPersonTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

/// Maps a `persons` row back to a person.
///
/// The address is only present when at least one address column is set.
fn person_from_row(row: &PgRow) -> Result<Person, StoreError> {
    let id: i64 = row.try_get("id")?;
    let name: Option<String> = row.try_get("name")?;
    let date_of_birth: Option<NaiveDate> = row.try_get("date_of_birth")?;
    let gender: Option<String> = row.try_get("gender")?;
    let children: Option<i32> = row.try_get("children")?;

    let country: Option<String> = row.try_get("country")?;
    let countrycode: Option<String> = row.try_get("countrycode")?;
    let city: Option<String> = row.try_get("city")?;
    let zipcode: Option<String> = row.try_get("zipcode")?;
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;

    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
        _ => None,
    };

    let address = Address {
        country,
        countrycode,
        city,
        zipcode,
        location,
    };
    let address = (address != Address::default()).then_some(address);

    Ok(Person {
        id: Some(id),
        name,
        date_of_birth,
        gender,
        children,
        address,
    })
}

#[async_trait]
impl PersonTransaction for PostgresPersonTransaction {
    async fn get(&mut self, id: i64) -> Result<Option<Person>, StoreError> {
        let row = sqlx::query(SELECT_PERSON)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(person_from_row).transpose()
    }

    async fn save(&mut self, person: &Person) -> Result<Person, StoreError> {
        let address = person.address.clone().unwrap_or_default();
        let (latitude, longitude) = match address.location {
            Some(point) => (Some(point.lat), Some(point.lon)),
            None => (None, None),
        };

        let id: i64 = match person.id {
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO persons
                        (name, date_of_birth, gender, children,
                         country, countrycode, city, zipcode, latitude, longitude)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    RETURNING id
                    "#,
                )
                .bind(&person.name)
                .bind(person.date_of_birth)
                .bind(&person.gender)
                .bind(person.children)
                .bind(&address.country)
                .bind(&address.countrycode)
                .bind(&address.city)
                .bind(&address.zipcode)
                .bind(latitude)
                .bind(longitude)
                .fetch_one(&mut *self.tx)
                .await?
            }
            Some(id) => {
                let (id, inserted): (i64, bool) = sqlx::query_as(
                    r#"
                    INSERT INTO persons
                        (id, name, date_of_birth, gender, children,
                         country, countrycode, city, zipcode, latitude, longitude)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    ON CONFLICT (id) DO UPDATE SET
                        name = EXCLUDED.name,
                        date_of_birth = EXCLUDED.date_of_birth,
                        gender = EXCLUDED.gender,
                        children = EXCLUDED.children,
                        country = EXCLUDED.country,
                        countrycode = EXCLUDED.countrycode,
                        city = EXCLUDED.city,
                        zipcode = EXCLUDED.zipcode,
                        latitude = EXCLUDED.latitude,
                        longitude = EXCLUDED.longitude
                    RETURNING id, (xmax = 0) AS inserted
                    "#,
                )
                .bind(id)
                .bind(&person.name)
                .bind(person.date_of_birth)
                .bind(&person.gender)
                .bind(person.children)
                .bind(&address.country)
                .bind(&address.countrycode)
                .bind(&address.city)
                .bind(&address.zipcode)
                .bind(latitude)
                .bind(longitude)
                .fetch_one(&mut *self.tx)
                .await?;

                // Explicit ids bypass the sequence; keep it ahead of newly inserted ones.
                // Updates of existing rows leave it alone.
                if inserted {
                    sqlx::query(
                        "SELECT setval('persons_id_seq', \
                         GREATEST($1, (SELECT last_value FROM persons_id_seq)))",
                    )
                    .bind(id)
                    .execute(&mut *self.tx)
                    .await?;
                }

                id
            }
        };

        debug!(id = id, "Person saved");

        let mut persisted = person.clone();
        persisted.id = Some(id);
        Ok(persisted)
    }

    async fn delete(&mut self, person: &Person) -> Result<(), StoreError> {
        let id = person
            .id
            .ok_or_else(|| StoreError::invalid_record("cannot delete a person without id"))?;

        sqlx::query("DELETE FROM persons WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        debug!(id = id, "Person deleted");
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
