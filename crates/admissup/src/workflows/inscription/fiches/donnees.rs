//! Per-kind payload of the fiches d'inscription.
//!
//! Each kind owns its own fields; the shared lifecycle lives on
//! [`super::Fiche`]. File contents themselves (photos, transcripts) are an
//! external storage collaborator; the records only keep pointers.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::super::domain::{CodeFormation, Voeu};
use super::super::parametrage::Modalite;
use super::FicheKind;

/// Pointer to an uploaded document held by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceJointe {
    pub nom: String,
    pub chemin: String,
}

/// Identité du candidat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheIdentite {
    pub photo: Option<PieceJointe>,
    pub piece_identite: Option<PieceJointe>,
    /// Code INSEE of the birth commune, for candidates born in France.
    pub commune_naissance: Option<String>,
    /// Free-text birthplace for candidates born abroad.
    pub commune_naissance_etranger: String,
    /// ISO-2 code of the birth country.
    pub pays_naissance: Option<String>,
    /// Address as maintained on the fiche, possibly corrected by the
    /// candidate from what Parcoursup sent.
    pub adresse: String,
    pub ville: Option<String>,
    pub pays: Option<String>,
    pub telephone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClasseBulletin {
    Premiere,
    Terminale,
}

/// Copie d'un bulletin scolaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletinScolaire {
    pub classe: ClasseBulletin,
    pub document: PieceJointe,
}

/// Scolarité antérieure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheScolariteAnterieure {
    /// UAI of the origin school, when it is known to the referential.
    pub etablissement: Option<String>,
    pub classe_terminale: String,
    pub specialite_terminale: String,
    /// Free-text fallback when the origin school has no UAI entry.
    pub autre_formation: String,
    pub bulletins: Vec<BulletinScolaire>,
}

/// Option picked by the candidate on the option-selection fiche.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChoisie {
    pub matiere: String,
    pub modalite: Modalite,
    pub rang: u8,
}

/// Choix des options dans la formation. Bound to the formation the wish
/// pointed at when the fiche was created; a wish moving to another
/// formation makes the fiche non-recyclable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FicheScolarite {
    pub formation: CodeFormation,
    pub options: Vec<OptionChoisie>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Externe,
    DemiPensionnaire,
    InterneExterne,
    Interne,
}

impl Regime {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Externe => "externe",
            Self::DemiPensionnaire => "demi-pensionnaire",
            Self::InterneExterne => "interne externé",
            Self::Interne => "interne",
        }
    }
}

/// Mode d'hébergement et coordonnées bancaires pour la pension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheHebergement {
    pub regime: Option<Regime>,
    pub iban: String,
    pub bic: String,
    pub titulaire_compte: String,
}

/// Renseignements spécifiques à l'internat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheInternat {
    /// Demandes particulières du candidat.
    pub message: String,
}

/// Bourse du supérieur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FicheBourse {
    pub boursier: bool,
    pub echelon: Option<u8>,
    /// Nombre d'enfants à charge, y compris l'étudiant.
    pub enfants_charge: u8,
    pub enfants_secondaire: u8,
    pub enfants_etablissement: u8,
    /// Copie de l'attestation conditionnelle de bourse.
    pub attribution_bourse: Option<PieceJointe>,
}

impl Default for FicheBourse {
    fn default() -> Self {
        Self {
            boursier: false,
            echelon: None,
            enfants_charge: 1,
            enfants_secondaire: 0,
            enfants_etablissement: 1,
            attribution_bourse: None,
        }
    }
}

/// Règlement intérieur.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheReglement {
    /// Set when the candidate checks the acknowledgement box, cleared when
    /// it is unchecked. A toggle, not a one-way action.
    pub signature_reglement: Option<NaiveDateTime>,
    pub autorisation_parents_eleves: bool,
}

impl FicheReglement {
    pub fn signer(&mut self, coche: bool, date: NaiveDateTime) {
        self.signature_reglement = if coche { Some(date) } else { None };
    }
}

/// Suivi des pièces justificatives attendues par la formation: codes of the
/// documents staff marked as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FichePiecesJustificatives {
    pub recues: BTreeSet<String>,
}

/// Payload discriminated by fiche kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fiche", rename_all = "snake_case")]
pub enum FicheDonnees {
    Identite(FicheIdentite),
    ScolariteAnterieure(FicheScolariteAnterieure),
    Scolarite(FicheScolarite),
    Hebergement(FicheHebergement),
    Internat(FicheInternat),
    Cesure,
    Bourse(FicheBourse),
    Reglement(FicheReglement),
    PiecesJustificatives(FichePiecesJustificatives),
}

impl FicheDonnees {
    pub fn kind(&self) -> FicheKind {
        match self {
            Self::Identite(_) => FicheKind::Identite,
            Self::ScolariteAnterieure(_) => FicheKind::ScolariteAnterieure,
            Self::Scolarite(_) => FicheKind::Scolarite,
            Self::Hebergement(_) => FicheKind::Hebergement,
            Self::Internat(_) => FicheKind::Internat,
            Self::Cesure => FicheKind::Cesure,
            Self::Bourse(_) => FicheKind::Bourse,
            Self::Reglement(_) => FicheKind::Reglement,
            Self::PiecesJustificatives(_) => FicheKind::PiecesJustificatives,
        }
    }

    /// Blank payload for a freshly created fiche. The option-selection fiche
    /// is pinned to the formation of the wish it is created for.
    pub fn vierge(kind: FicheKind, voeu: &Voeu) -> Self {
        match kind {
            FicheKind::Identite => Self::Identite(FicheIdentite::default()),
            FicheKind::ScolariteAnterieure => {
                Self::ScolariteAnterieure(FicheScolariteAnterieure::default())
            }
            FicheKind::Scolarite => Self::Scolarite(FicheScolarite {
                formation: voeu.formation,
                options: Vec::new(),
            }),
            FicheKind::Hebergement => Self::Hebergement(FicheHebergement::default()),
            FicheKind::Internat => Self::Internat(FicheInternat::default()),
            FicheKind::Cesure => Self::Cesure,
            FicheKind::Bourse => Self::Bourse(FicheBourse::default()),
            FicheKind::Reglement => Self::Reglement(FicheReglement::default()),
            FicheKind::PiecesJustificatives => {
                Self::PiecesJustificatives(FichePiecesJustificatives::default())
            }
        }
    }
}
