use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fiches::{EtatFiche, Fiche, FicheKind};

/// Numéro de dossier Parcoursup: the unique admission-file number, used as
/// the matching key for every reconciliation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NumeroDossier(pub u32);

impl fmt::Display for NumeroDossier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code formation Parcoursup (codeFormationPsup).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CodeFormation(pub i32);

impl fmt::Display for CodeFormation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Homme,
    Femme,
}

impl Genre {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Homme => "homme",
            Self::Femme => "femme",
        }
    }
}

/// Mention au baccalauréat, as encoded by Parcoursup (0 to 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionBac {
    Passable,
    AssezBien,
    Bien,
    TresBien,
}

impl MentionBac {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Passable),
            1 => Some(Self::AssezBien),
            2 => Some(Self::Bien),
            3 => Some(Self::TresBien),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Passable => "passable",
            Self::AssezBien => "assez bien",
            Self::Bien => "bien",
            Self::TresBien => "très bien",
        }
    }
}

/// Authentication account attached to a candidate. Session handling is an
/// external collaborator; the registry only keeps the address and the last
/// login timestamp, which the mailing filters rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompteCandidat {
    pub email: String,
    pub derniere_connexion: Option<DateTime<Utc>>,
}

/// Candidat admis. Created on the first admission notification, mutated on
/// every following one, never deleted (administrative record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidat {
    pub dossier: NumeroDossier,
    pub genre: Genre,
    pub nom: String,
    pub prenom: String,
    pub adresse: String,
    pub telephone: String,
    pub telephone_mobile: String,
    pub date_naissance: Option<NaiveDate>,
    /// INE (numéro d'étudiant national), unique when present.
    pub ine: Option<String>,
    pub bac_date: Option<NaiveDate>,
    pub bac_serie: Option<String>,
    pub bac_mention: Option<MentionBac>,
    pub compte: CompteCandidat,
    pub email_bienvenue_envoye: bool,
    /// Administrative-enrollment confirmation pushed back to Parcoursup.
    pub inscription_confirmee: bool,
    pub message_confirmation: String,
}

impl Candidat {
    pub fn nom_complet(&self) -> String {
        format!("{} {}", self.prenom, self.nom)
    }
}

/// Responsable légal d'un candidat. Parcoursup sends no stable guardian
/// identifier, so guardians are only created while the candidate has none
/// and are afterwards edited exclusively through the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsableLegal {
    pub genre: Option<Genre>,
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: String,
    pub telephone_mobile: String,
    pub adresse: String,
}

/// État d'un vœu tel que suivi localement.
///
/// The discriminants deliberately do NOT mirror the Parcoursup
/// `codeSituation` values; the bridge is the explicit table in
/// `workflows::parcoursup::mapping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtatVoeu {
    Attente,
    AccepteAutres,
    AccepteDefinitif,
    Refuse,
}

impl EtatVoeu {
    pub const fn accepte(self) -> bool {
        matches!(self, Self::AccepteAutres | Self::AccepteDefinitif)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Attente => "en liste d'attente",
            Self::AccepteAutres => "accepté avec autres vœux en attente",
            Self::AccepteDefinitif => "accepté définitivement",
            Self::Refuse => "refusé par le candidat",
        }
    }
}

/// Vœu d'un candidat sur une formation. The upsert key is
/// (candidat, formation, internat): Parcoursup can legitimately expose the
/// same formation twice with different boarding flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Voeu {
    pub candidat: NumeroDossier,
    pub formation: CodeFormation,
    pub internat: bool,
    pub cesure: bool,
    pub etat: EtatVoeu,
}

/// Journal entry appended whenever a vœu changes state: the state it left
/// and the decision timestamp (Europe/Paris civil time). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoriqueVoeu {
    pub formation: CodeFormation,
    pub internat: bool,
    pub etat: EtatVoeu,
    pub date: NaiveDateTime,
}

/// Failure modes of the `voeu_actuel` accessor. Both are legitimate data
/// states, never to be papered over with an arbitrary pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoeuActuelError {
    #[error("aucun vœu accepté pour ce candidat")]
    Aucun,
    #[error("{0} vœux simultanément acceptés pour ce candidat")]
    Plusieurs(usize),
}

/// Synthetic state of a whole dossier, derived from its presented fiches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtatDossier {
    Edition,
    Complet,
    Termine,
}

impl EtatDossier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edition => "en cours d'édition",
            Self::Complet => "complet",
            Self::Termine => "terminé",
        }
    }
}

/// Aggregate persisted per candidate: identity, guardians, wishes, wish
/// history, and the fiche set. The store saves it atomically, which is what
/// keeps a failed import from leaving wishes and fiches out of step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub candidat: Candidat,
    pub responsables: Vec<ResponsableLegal>,
    pub voeux: Vec<Voeu>,
    pub historique: Vec<HistoriqueVoeu>,
    pub fiches: Vec<Fiche>,
}

impl Dossier {
    pub fn nouveau(candidat: Candidat) -> Self {
        Self {
            candidat,
            responsables: Vec::new(),
            voeux: Vec::new(),
            historique: Vec::new(),
            fiches: Vec::new(),
        }
    }

    /// The wish the dossier currently hangs off: exactly one accepted vœu.
    pub fn voeu_actuel(&self) -> Result<&Voeu, VoeuActuelError> {
        let mut acceptes = self.voeux.iter().filter(|voeu| voeu.etat.accepte());
        let premier = acceptes.next().ok_or(VoeuActuelError::Aucun)?;
        match acceptes.count() {
            0 => Ok(premier),
            reste => Err(VoeuActuelError::Plusieurs(reste + 1)),
        }
    }

    pub fn voeu_mut(&mut self, formation: CodeFormation, internat: bool) -> Option<&mut Voeu> {
        self.voeux
            .iter_mut()
            .find(|voeu| voeu.formation == formation && voeu.internat == internat)
    }

    /// The live (non-annulée) fiche of a given kind, if any.
    pub fn fiche(&self, kind: FicheKind) -> Option<&Fiche> {
        self.fiches
            .iter()
            .find(|fiche| fiche.kind() == kind && fiche.etat != EtatFiche::Annulee)
    }

    pub fn fiche_mut(&mut self, kind: FicheKind) -> Option<&mut Fiche> {
        self.fiches
            .iter_mut()
            .find(|fiche| fiche.kind() == kind && fiche.etat != EtatFiche::Annulee)
    }

    /// Dossier-level state over the fiches the etablissement presents:
    /// Terminé once staff validated everything, Complet once the candidate
    /// confirmed everything, Édition otherwise.
    pub fn etat_dossier<'a>(
        &self,
        presentees: impl IntoIterator<Item = &'a FicheKind>,
    ) -> EtatDossier {
        let mut etat = EtatDossier::Termine;
        for kind in presentees {
            let Some(fiche) = self.fiche(*kind) else {
                continue;
            };
            match fiche.etat {
                EtatFiche::Edition => return EtatDossier::Edition,
                EtatFiche::Confirmee => etat = EtatDossier::Complet,
                EtatFiche::Terminee | EtatFiche::Annulee => {}
            }
        }
        etat
    }
}
