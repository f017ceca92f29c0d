use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Unique index names are matched in `infra::storage` to report duplicates.
const UP: &str = r"
CREATE TABLE IF NOT EXISTS customers (
    id            BIGSERIAL PRIMARY KEY,
    tenant_id     UUID NOT NULL DEFAULT NULLIF(current_setting('app.current_tenant_id', true), '')::uuid,
    first_name    VARCHAR(100) NOT NULL,
    last_name     VARCHAR(100) NOT NULL,
    email         VARCHAR(255),
    phone         VARCHAR(20),
    customer_type VARCHAR(20) NOT NULL DEFAULT 'individual'
                  CHECK (customer_type IN ('individual', 'business')),
    company_name  VARCHAR(255),
    tax_id        VARCHAR(50),
    address       VARCHAR(500),
    birthday      DATE,
    notes         TEXT,
    preferences   JSONB NOT NULL DEFAULT '{}'::jsonb,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS customers_tenant_email_key
    ON customers (tenant_id, email) WHERE email IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS customers_tenant_tax_id_key
    ON customers (tenant_id, tax_id) WHERE tax_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_customers_tenant ON customers (tenant_id);
CREATE INDEX IF NOT EXISTS idx_customers_created_at ON customers (created_at);
CREATE INDEX IF NOT EXISTS idx_customers_name ON customers (last_name, first_name);

CREATE TABLE IF NOT EXISTS vehicles (
    id            BIGSERIAL PRIMARY KEY,
    tenant_id     UUID NOT NULL DEFAULT NULLIF(current_setting('app.current_tenant_id', true), '')::uuid,
    customer_id   BIGINT NOT NULL REFERENCES customers (id) ON DELETE CASCADE,
    make          VARCHAR(50) NOT NULL,
    model         VARCHAR(50) NOT NULL,
    year          INTEGER NOT NULL CHECK (year BETWEEN 1900 AND 2100),
    vin           VARCHAR(17),
    license_plate VARCHAR(20),
    color         VARCHAR(30),
    engine        VARCHAR(100),
    notes         TEXT,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    metadata      JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS vehicles_vin_key
    ON vehicles (vin) WHERE vin IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS vehicles_license_plate_key
    ON vehicles (license_plate) WHERE license_plate IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_vehicles_tenant ON vehicles (tenant_id);
CREATE INDEX IF NOT EXISTS idx_vehicles_customer ON vehicles (customer_id);
CREATE INDEX IF NOT EXISTS idx_vehicles_make_model ON vehicles (make, model, year);

CREATE TABLE IF NOT EXISTS customer_notes (
    id          BIGSERIAL PRIMARY KEY,
    tenant_id   UUID NOT NULL DEFAULT NULLIF(current_setting('app.current_tenant_id', true), '')::uuid,
    customer_id BIGINT NOT NULL REFERENCES customers (id) ON DELETE CASCADE,
    staff_id    VARCHAR(200) NOT NULL,
    staff_name  VARCHAR(200) NOT NULL,
    note        TEXT NOT NULL,
    note_type   VARCHAR(20) NOT NULL DEFAULT 'general',
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_customer_notes_tenant ON customer_notes (tenant_id);
CREATE INDEX IF NOT EXISTS idx_customer_notes_customer ON customer_notes (customer_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_customer_notes_staff ON customer_notes (staff_id);
";

const DOWN: &str = r"
DROP TABLE IF EXISTS customer_notes;
DROP TABLE IF EXISTS vehicles;
DROP TABLE IF EXISTS customers;
";

#[allow(elided_lifetimes_in_paths)]
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DOWN).await?;
        Ok(())
    }
}
