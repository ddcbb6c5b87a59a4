//! Per-institution configuration: formations and their option catalog,
//! the subset of fiches presented to candidates, excluded-field overrides,
//! contact addresses, and Parcoursup credentials.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::CodeFormation;
use super::fiches::FicheKind;

/// Établissement d'accueil, keyed by its UAI number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Etablissement {
    pub uai: String,
    pub nom: String,
    /// Default contact address, used as fallback by the formations below.
    pub email: String,
    /// Address candidates send supporting documents to.
    pub email_pieces_justificatives: String,
    /// Address to contact when something breaks.
    pub email_technique: String,
    /// Whether admission synchronization is currently enabled.
    pub inscriptions: bool,
    /// Fiche kinds this etablissement presents to its candidates.
    /// Applicability and presentation are independent gates.
    pub fiches: BTreeSet<FicheKind>,
    pub champs_exclus: ChampsExclus,
}

impl Etablissement {
    /// Presentation gate for a fiche kind.
    pub fn presente(&self, kind: FicheKind) -> bool {
        self.fiches.contains(&kind)
    }
}

/// Per-etablissement override of which fields count towards a fiche's
/// validity. An excluded field makes its requirement vacuous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChampsExclus(BTreeSet<(FicheKind, String)>);

impl ChampsExclus {
    pub fn exclure(&mut self, kind: FicheKind, champ: &str) {
        self.0.insert((kind, champ.to_string()));
    }

    pub fn retablir(&mut self, kind: FicheKind, champ: &str) {
        self.0.remove(&(kind, champ.to_string()));
    }

    pub fn est_exclu(&self, kind: FicheKind, champ: &str) -> bool {
        self.0.contains(&(kind, champ.to_string()))
    }

    /// True when the field still takes part in the validity check.
    pub fn requis(&self, kind: FicheKind, champ: &str) -> bool {
        !self.est_exclu(kind, champ)
    }
}

/// Modalité d'une option au programme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modalite {
    Obligatoire,
    Facultative,
}

/// Matière du référentiel MEF (nomenclature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MefMatiere {
    pub code: String,
    pub libelle: String,
}

/// Option offered by a formation. Options sharing an obligatory `rang` are
/// mutually exclusive; `inscriptions` flags whether the option is presented
/// to candidates at enrollment time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MefOption {
    pub matiere: MefMatiere,
    pub modalite: Modalite,
    pub rang: u8,
    pub inscriptions: bool,
}

/// Supporting document expected from enrolling candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceAttendue {
    pub code: String,
    pub libelle: String,
    pub descriptif: String,
    /// Address this specific document must be sent to, when it differs from
    /// the formation/etablissement default.
    pub email_specifique: Option<String>,
}

/// Formation dispensée dans un établissement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub code_parcoursup: CodeFormation,
    pub nom: String,
    pub etablissement: String,
    pub groupe_parcoursup: i32,
    pub code_mef: String,
    pub slug: String,
    /// Overrides the etablissement address when non-empty.
    pub email_pieces_justificatives: String,
    pub options: Vec<MefOption>,
    pub pieces_attendues: Vec<PieceAttendue>,
}

impl Formation {
    /// Address candidates send their supporting documents to: the
    /// formation-specific one when set, the etablissement default
    /// otherwise.
    pub fn email_pieces<'a>(&'a self, etablissement: &'a Etablissement) -> &'a str {
        if self.email_pieces_justificatives.is_empty() {
            &etablissement.email_pieces_justificatives
        } else {
            &self.email_pieces_justificatives
        }
    }

    /// Obligatory ranks the candidate must cover, restricted to options
    /// actually presented at enrollment.
    pub fn rangs_obligatoires(&self) -> BTreeSet<u8> {
        self.options
            .iter()
            .filter(|option| option.modalite == Modalite::Obligatoire && option.inscriptions)
            .map(|option| option.rang)
            .collect()
    }
}

/// Commune, keyed by INSEE code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commune {
    pub code_insee: String,
    pub nom: String,
}

/// Pays du référentiel INSEE. Carries both encodings the Parcoursup API has
/// been observed to send for the same field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pays {
    pub code_iso2: String,
    pub num_insee: String,
    pub libelle: String,
}

/// Credentials tied to one etablissement: the pair Parcoursup uses to call
/// us (entrant) and the pair we use to call Parcoursup (sortant). The
/// outbound password travels in clear inside each request body, as the API
/// requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccesParcoursup {
    pub etablissement: String,
    pub entrant_login: String,
    pub entrant_password: String,
    pub sortant_login: String,
    pub sortant_password: String,
}
