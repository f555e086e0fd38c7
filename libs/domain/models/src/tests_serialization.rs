// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V3.2 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON Y SELLADO DE CONTENIDO
 *
 * # Logic:
 * Valida la cadena completa Struct -> JSON -> Network-Sim -> JSON -> Struct
 * para los contratos que cruzan la frontera agente/orquestador, y certifica
 * que el digest canónico de dependencias sea insensible al orden.
 * =================================================================
 */
