// [libs/infra/db/src/repositories/tenant.rs]
/*!
 * =================================================================
 * APARATO: TENANT REGISTRY REPOSITORY (V3.4 - ISOLATION GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE TENANTS Y TOKENS DE ENROLAMIENTO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE-USE SEAL: El consumo del token es un UPDATE guardado por
 *    'consumed_at IS NULL'; el conteo de filas afectadas hace que la
 *    carrera de doble consumo produzca exactamente una credencial.
 * 2. SECRET HYGIENE: Solo huellas SHA-256 tocan el Ledger; el secreto
 *    plano viaja al operador una única vez.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use chrono::{Duration, Utc};
use libsql::params;
use sentinel_domain_models::digest::sha256_hexadecimal_digest;
use sentinel_domain_models::tenant::{Tenant, TenantStatus};
use tracing::{info, instrument};
use uuid::Uuid;

/// Veredicto transaccional del canje de un token de enrolamiento.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenConsumeVerdict {
    /// Token válido y sellado; porta el tenant al que quedó vinculado.
    Consumed { tenant_id: String },
    /// Desconocido, revocado, expirado o ya consumido.
    Invalid,
    /// El token es válido pero su tenant está suspendido.
    TenantSuspended,
}

pub struct TenantRepository {
    database_client: StoreClient,
}

impl TenantRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self))]
    pub async fn create_tenant(&self, tenant_id: &str, display_name: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT INTO tenants (tenant_id, display_name, status, created_at)
                 VALUES (?1, ?2, 'active', ?3)
                 ON CONFLICT(tenant_id) DO NOTHING",
                params![tenant_id, display_name, Utc::now().to_rfc3339()],
            )
            .await?;

        info!("🏛️  [TENANT_REGISTRY]: Tenant [{}] registered.", tenant_id);
        Ok(())
    }

    pub async fn fetch_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT tenant_id, display_name, status, created_at FROM tenants WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let status_raw: String = row.get(2)?;
                let created_raw: String = row.get(3)?;

                Ok(Some(Tenant {
                    tenant_id: row.get(0)?,
                    display_name: row.get(1)?,
                    status: if status_raw == "suspended" {
                        TenantStatus::Suspended
                    } else {
                        TenantStatus::Active
                    },
                    created_at: created_raw
                        .parse()
                        .map_err(|fault| DbError::MappingError(format!("TENANT_TIMESTAMP: {}", fault)))?,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn set_tenant_status(&self, tenant_id: &str, status: &TenantStatus) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let status_literal = match status {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
        };

        let affected = connection
            .execute(
                "UPDATE tenants SET status = ?1 WHERE tenant_id = ?2",
                params![status_literal, tenant_id],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /**
     * Acuña un token de enrolamiento de un solo uso vinculado al tenant.
     * Retorna el secreto plano exactamente una vez; el Ledger solo ve la huella.
     */
    #[instrument(skip(self))]
    pub async fn mint_enrollment_token(
        &self,
        tenant_id: &str,
        time_to_live_seconds: i64,
    ) -> Result<String, DbError> {
        if self.fetch_tenant(tenant_id).await?.is_none() {
            return Err(DbError::NotFound);
        }

        let plaintext_token = format!("enr_{}", Uuid::new_v4().simple());
        let token_digest = sha256_hexadecimal_digest(plaintext_token.as_bytes());
        let now = Utc::now();

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO enrollment_tokens
                    (token_digest, tenant_id, expires_at, single_use, consumed_at, revoked_at, created_at)
                 VALUES (?1, ?2, ?3, 1, NULL, NULL, ?4)",
                params![
                    token_digest,
                    tenant_id,
                    (now + Duration::seconds(time_to_live_seconds)).to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        info!("🎫 [TENANT_REGISTRY]: Enrollment token minted for tenant [{}].", tenant_id);
        Ok(plaintext_token)
    }

    /**
     * Canjea un token presentado por un agente de forma atómica.
     *
     * # Mathematical Proof (Race-Safe Single Use):
     * El UPDATE guardado por 'consumed_at IS NULL' es la única vía de
     * consumo. Bajo N canjes concurrentes, el motor SQL serializa la
     * escritura y exactamente uno observa rows_affected = 1.
     */
    #[instrument(skip(self, presented_token))]
    pub async fn consume_enrollment_token(
        &self,
        presented_token: &str,
    ) -> Result<TokenConsumeVerdict, DbError> {
        let token_digest = sha256_hexadecimal_digest(presented_token.as_bytes());
        let now = Utc::now();

        let connection = self.database_client.get_connection()?;

        // --- FASE 1: LECTURA DEL CANDIDATO ---
        let mut rows = connection
            .query(
                "SELECT tenant_id, expires_at, consumed_at, revoked_at
                 FROM enrollment_tokens WHERE token_digest = ?1",
                params![token_digest.clone()],
            )
            .await?;

        let candidate_row = match rows.next().await? {
            Some(row) => row,
            None => return Ok(TokenConsumeVerdict::Invalid),
        };

        let tenant_id: String = candidate_row.get(0)?;
        let expires_at_raw: String = candidate_row.get(1)?;
        let already_consumed = candidate_row.get::<String>(2).is_ok();
        let already_revoked = candidate_row.get::<String>(3).is_ok();

        if already_consumed || already_revoked || expires_at_raw <= now.to_rfc3339() {
            return Ok(TokenConsumeVerdict::Invalid);
        }

        // --- FASE 2: VERIFICACIÓN DE SALUD DEL TENANT ---
        match self.fetch_tenant(&tenant_id).await? {
            Some(tenant) if tenant.status == TenantStatus::Suspended => {
                return Ok(TokenConsumeVerdict::TenantSuspended);
            }
            Some(_) => {}
            None => return Ok(TokenConsumeVerdict::Invalid),
        }

        // --- FASE 3: SELLADO ATÓMICO DE UN SOLO USO ---
        let affected = connection
            .execute(
                "UPDATE enrollment_tokens
                 SET consumed_at = ?1
                 WHERE token_digest = ?2 AND consumed_at IS NULL AND revoked_at IS NULL",
                params![now.to_rfc3339(), token_digest],
            )
            .await?;

        if affected == 1 {
            Ok(TokenConsumeVerdict::Consumed { tenant_id })
        } else {
            // Un canje concurrente ganó la carrera.
            Ok(TokenConsumeVerdict::Invalid)
        }
    }

    /// Revoca un token aún no consumido (gobernanza del operador).
    pub async fn revoke_enrollment_token(&self, presented_token_digest: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let affected = connection
            .execute(
                "UPDATE enrollment_tokens
                 SET revoked_at = ?1
                 WHERE token_digest = ?2 AND consumed_at IS NULL AND revoked_at IS NULL",
                params![Utc::now().to_rfc3339(), presented_token_digest],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
