// [libs/infra/db/src/repositories/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT IDENTITY REPOSITORY (V3.5 - CREDENTIAL GOVERNANCE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: AGENTES, CREDENCIALES PORTADORAS Y BIOMETRÍA DE HOST
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CREDENTIAL AUTHORITY: La resolución credencial -> (agente, tenant)
 *    es la ÚNICA fuente de identidad de las peticiones autenticadas.
 * 2. ROTATION OVERLAP: La rotación acuña material nuevo y recorta la
 *    expiración del antiguo a la ventana de solape configurada,
 *    preservando el agent_id histórico.
 * 3. SOFT ARCHIVE: Los agentes jamás se borran; los hallazgos
 *    históricos referencian su identidad de forma perpetua.
 * =================================================================
 */

use crate::errors::DbError;
use crate::StoreClient;
use chrono::{Duration, Utc};
use libsql::params;
use sentinel_domain_models::agent::{Agent, AgentEnrollmentInfo, AgentStatus, HeartbeatReport, SystemInfoSnapshot};
use sentinel_domain_models::digest::sha256_hexadecimal_digest;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Material de credencial recién acuñado. El secreto plano viaja al
/// agente exactamente una vez y jamás es recuperable de nuevo.
#[derive(Debug, Clone)]
pub struct MintedCredential {
    pub credential_id: String,
    pub plaintext_secret: String,
    pub expires_at: String,
}

/// Identidad resuelta desde una credencial presentada.
#[derive(Debug, Clone)]
pub struct CredentialResolution {
    pub credential_id: String,
    pub agent_id: String,
    pub tenant_id: String,
}

pub struct AgentRepository {
    database_client: StoreClient,
}

impl AgentRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Acuña la identidad de un agente durante el enrolamiento.
     */
    #[instrument(skip(self, enrollment_info))]
    pub async fn enroll_agent(
        &self,
        tenant_id: &str,
        enrollment_info: &AgentEnrollmentInfo,
    ) -> Result<Agent, DbError> {
        let agent_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO agents
                    (agent_id, tenant_id, hostname, operating_system, architecture,
                     first_seen_at, last_seen_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'online')",
                params![
                    agent_id.clone(),
                    tenant_id,
                    enrollment_info.hostname.clone(),
                    enrollment_info.operating_system.clone(),
                    enrollment_info.architecture.clone(),
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await?;

        info!("🛡️  [AGENT_REGISTRY]: Agent [{}] enrolled under tenant [{}].", agent_id, tenant_id);

        Ok(Agent {
            agent_id,
            tenant_id: tenant_id.to_string(),
            hostname: enrollment_info.hostname.clone(),
            operating_system: enrollment_info.operating_system.clone(),
            architecture: enrollment_info.architecture.clone(),
            first_seen_at: now,
            last_seen_at: now,
            status: AgentStatus::Online,
        })
    }

    /**
     * Emite una credencial portadora fresca para el agente.
     */
    #[instrument(skip(self))]
    pub async fn issue_credential(
        &self,
        agent_id: &str,
        tenant_id: &str,
        time_to_live_seconds: i64,
    ) -> Result<MintedCredential, DbError> {
        let credential_id = Uuid::new_v4().to_string();
        let plaintext_secret = format!("cred_{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let secret_digest = sha256_hexadecimal_digest(plaintext_secret.as_bytes());
        let now = Utc::now();
        let expires_at = (now + Duration::seconds(time_to_live_seconds)).to_rfc3339();

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO agent_credentials
                    (credential_id, agent_id, tenant_id, secret_digest, issued_at, expires_at, revoked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                params![
                    credential_id.clone(),
                    agent_id,
                    tenant_id,
                    secret_digest,
                    now.to_rfc3339(),
                    expires_at.clone()
                ],
            )
            .await?;

        Ok(MintedCredential {
            credential_id,
            plaintext_secret,
            expires_at,
        })
    }

    /**
     * Resuelve una credencial presentada a su identidad vinculada.
     * Rechaza material expirado, revocado o de agentes archivados.
     */
    pub async fn resolve_credential(
        &self,
        presented_secret: &str,
    ) -> Result<Option<CredentialResolution>, DbError> {
        let secret_digest = sha256_hexadecimal_digest(presented_secret.as_bytes());
        let now_stamp = Utc::now().to_rfc3339();

        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT c.credential_id, c.agent_id, c.tenant_id
                 FROM agent_credentials c
                 JOIN agents a ON a.agent_id = c.agent_id
                 WHERE c.secret_digest = ?1
                   AND c.revoked_at IS NULL
                   AND c.expires_at > ?2
                   AND a.status != 'archived'",
                params![secret_digest, now_stamp],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(CredentialResolution {
                credential_id: row.get(0)?,
                agent_id: row.get(1)?,
                tenant_id: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    /**
     * Rota la credencial de un agente preservando su identidad histórica.
     * La credencial previa sigue vigente durante la ventana de solape y
     * después queda expirada de forma natural.
     */
    #[instrument(skip(self))]
    pub async fn rotate_credential(
        &self,
        previous_credential_id: &str,
        agent_id: &str,
        tenant_id: &str,
        overlap_seconds: i64,
        time_to_live_seconds: i64,
    ) -> Result<MintedCredential, DbError> {
        let overlap_boundary = (Utc::now() + Duration::seconds(overlap_seconds)).to_rfc3339();

        let connection = self.database_client.get_connection()?;

        // El recorte solo aplica si el material antiguo vivía más allá del solape.
        connection
            .execute(
                "UPDATE agent_credentials
                 SET expires_at = ?1
                 WHERE credential_id = ?2 AND expires_at > ?1",
                params![overlap_boundary.clone(), previous_credential_id],
            )
            .await?;

        let fresh_credential = self
            .issue_credential(agent_id, tenant_id, time_to_live_seconds)
            .await?;

        info!(
            "🔄 [CREDENTIAL_ROTATION]: Agent [{}] rotated material; previous overlap until {}.",
            agent_id, overlap_boundary
        );

        Ok(fresh_credential)
    }

    /// Barrido de gobernanza: revoca credenciales ya expiradas.
    pub async fn revoke_expired_credentials(&self) -> Result<u64, DbError> {
        let now_stamp = Utc::now().to_rfc3339();

        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE agent_credentials
                 SET revoked_at = ?1
                 WHERE revoked_at IS NULL AND expires_at <= ?1",
                params![now_stamp],
            )
            .await?;

        if affected > 0 {
            warn!("🧹 [CREDENTIAL_SWEEP]: Revoked {} expired credentials.", affected);
        }
        Ok(affected)
    }

    pub async fn fetch_agent(&self, tenant_id: &str, agent_id: &str) -> Result<Option<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT agent_id, tenant_id, hostname, operating_system, architecture,
                        first_seen_at, last_seen_at, status
                 FROM agents WHERE tenant_id = ?1 AND agent_id = ?2",
                params![tenant_id, agent_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let status_raw: String = row.get(7)?;
                let first_seen_raw: String = row.get(5)?;
                let last_seen_raw: String = row.get(6)?;

                Ok(Some(Agent {
                    agent_id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    hostname: row.get(2)?,
                    operating_system: row.get(3)?,
                    architecture: row.get(4)?,
                    first_seen_at: first_seen_raw
                        .parse()
                        .map_err(|fault| DbError::MappingError(format!("AGENT_TIMESTAMP: {}", fault)))?,
                    last_seen_at: last_seen_raw
                        .parse()
                        .map_err(|fault| DbError::MappingError(format!("AGENT_TIMESTAMP: {}", fault)))?,
                    status: match status_raw.as_str() {
                        "stale" => AgentStatus::Stale,
                        "archived" => AgentStatus::Archived,
                        _ => AgentStatus::Online,
                    },
                }))
            }
            None => Ok(None),
        }
    }

    /// Refresco del material descriptivo (vía legacy de registro).
    pub async fn refresh_enrollment_info(
        &self,
        tenant_id: &str,
        agent_id: &str,
        enrollment_info: &AgentEnrollmentInfo,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let affected = connection
            .execute(
                "UPDATE agents
                 SET hostname = ?1, operating_system = ?2, architecture = ?3, last_seen_at = ?4
                 WHERE tenant_id = ?5 AND agent_id = ?6",
                params![
                    enrollment_info.hostname.clone(),
                    enrollment_info.operating_system.clone(),
                    enrollment_info.architecture.clone(),
                    Utc::now().to_rfc3339(),
                    tenant_id,
                    agent_id
                ],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /**
     * Registra un latido de vida: last-seen + transición a 'online'.
     * El latido jamás entra a la cola de enriquecimiento.
     */
    pub async fn record_heartbeat(
        &self,
        tenant_id: &str,
        agent_id: &str,
        _report: &HeartbeatReport,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let affected = connection
            .execute(
                "UPDATE agents
                 SET last_seen_at = ?1,
                     status = CASE WHEN status = 'archived' THEN status ELSE 'online' END
                 WHERE tenant_id = ?2 AND agent_id = ?3",
                params![Utc::now().to_rfc3339(), tenant_id, agent_id],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Reemplazo atómico del snapshot de host (last-writer-wins).
    pub async fn replace_system_info(
        &self,
        tenant_id: &str,
        agent_id: &str,
        snapshot: &SystemInfoSnapshot,
    ) -> Result<(), DbError> {
        let snapshot_json = serde_json::to_string(snapshot)
            .map_err(|fault| DbError::MappingError(format!("SNAPSHOT_ENCODING: {}", fault)))?;

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO system_info (agent_id, tenant_id, snapshot_json, captured_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(agent_id) DO UPDATE SET
                     snapshot_json = excluded.snapshot_json,
                     captured_at = excluded.captured_at",
                params![agent_id, tenant_id, snapshot_json, Utc::now().to_rfc3339()],
            )
            .await?;

        Ok(())
    }

    pub async fn fetch_system_info(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<Option<SystemInfoSnapshot>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT snapshot_json FROM system_info WHERE tenant_id = ?1 AND agent_id = ?2",
                params![tenant_id, agent_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let snapshot_json: String = row.get(0)?;
                let snapshot = serde_json::from_str(&snapshot_json)
                    .map_err(|fault| DbError::MappingError(format!("SNAPSHOT_DECODING: {}", fault)))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Transición online -> stale para agentes sin latidos recientes.
    pub async fn mark_stale_agents(&self, silence_window_seconds: i64) -> Result<u64, DbError> {
        let silence_boundary = (Utc::now() - Duration::seconds(silence_window_seconds)).to_rfc3339();

        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE agents SET status = 'stale'
                 WHERE status = 'online' AND last_seen_at < ?1",
                params![silence_boundary],
            )
            .await?;

        Ok(affected)
    }
}
