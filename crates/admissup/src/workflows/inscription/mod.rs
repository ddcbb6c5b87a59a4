//! Local side of the enrollment workflow: the candidate registry, the
//! fiche lifecycle, the import engine fed by Parcoursup notifications, and
//! the mailing batch.

pub mod domain;
pub mod fiches;
pub mod import;
pub mod mailing;
pub mod parametrage;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    Candidat, CodeFormation, CompteCandidat, Dossier, EtatDossier, EtatVoeu, Genre,
    HistoriqueVoeu, MentionBac, NumeroDossier, ResponsableLegal, Voeu, VoeuActuelError,
};
pub use fiches::{
    Acteur, EtatFiche, Fiche, FicheDonnees, FicheError, FicheId, FicheKind,
};
pub use import::{BilanImport, ImportError, ImportService, RejetImport};
pub use mailing::{BilanMailing, Envoi, Mailing};
pub use parametrage::{
    AccesParcoursup, ChampsExclus, Commune, Etablissement, Formation, MefMatiere, MefOption,
    Modalite, Pays, PieceAttendue,
};
pub use repository::{
    Courriel, CourrielError, DossierStore, MailGateway, Parametrage, StoreError,
};
pub use router::parcoursup_router;
