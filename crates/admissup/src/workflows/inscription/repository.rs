//! Storage and outbound-mail abstractions so the engines can be exercised
//! in isolation. Production backs these with the relational store and the
//! SMTP relay; tests and the bundled service use in-memory versions.

use serde::{Deserialize, Serialize};

use super::domain::{CodeFormation, Dossier, NumeroDossier};
use super::parametrage::{AccesParcoursup, Commune, Etablissement, Formation, Pays};

/// Candidate-aggregate store. `sauvegarder` replaces the whole aggregate in
/// one operation; implementations must make that write atomic and serialize
/// concurrent writes to the same dossier.
pub trait DossierStore: Send + Sync {
    fn charger(&self, dossier: NumeroDossier) -> Result<Option<Dossier>, StoreError>;
    fn sauvegarder(&self, dossier: Dossier) -> Result<(), StoreError>;
    fn tous(&self) -> Result<Vec<Dossier>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stockage indisponible: {0}")]
    Indisponible(String),
}

/// Read-only access to the institutional referential: etablissements,
/// formations, reference tables, and API credentials. Lookup misses are
/// ordinary (`None`), not failures; enrichment runs with whatever resolves.
pub trait Parametrage: Send + Sync {
    fn etablissement(&self, uai: &str) -> Option<Etablissement>;
    fn formation(&self, code: CodeFormation) -> Option<Formation>;
    fn commune(&self, code_insee: &str) -> Option<Commune>;
    fn pays_par_iso2(&self, code: &str) -> Option<Pays>;
    fn pays_par_insee(&self, code: &str) -> Option<Pays>;
    /// Name of an origin school by UAI, a much wider directory than the
    /// configured etablissements.
    fn etablissement_origine(&self, uai: &str) -> Option<String>;
    /// Checks an inbound `identifiant` pair and returns the UAI of the
    /// etablissement it belongs to.
    fn authentifier_entrant(&self, login: &str, password: &str) -> Option<String>;
    /// Credentials for calling Parcoursup on behalf of an etablissement.
    fn acces(&self, uai: &str) -> Option<AccesParcoursup>;
}

/// Outbound message, fully addressed. Delivery mechanics are a collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Courriel {
    pub de: String,
    pub a: String,
    pub cc: Vec<String>,
    pub repondre_a: Option<String>,
    pub sujet: String,
    pub corps: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CourrielError {
    #[error("envoi impossible: {0}")]
    Transport(String),
}

/// Outbound e-mail seam (welcome messages, mailings).
pub trait MailGateway: Send + Sync {
    fn envoyer(&self, courriel: &Courriel) -> Result<(), CourrielError>;
}
