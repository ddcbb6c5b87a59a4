//! Fiches d'inscription: one record per section of a candidate's dossier,
//! each with its own fields, applicability rule, recyclability rule, and
//! validity check, sharing a single lifecycle state machine.

pub mod donnees;
mod lifecycle;
mod validite;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{NumeroDossier, Voeu};
pub use donnees::{
    BulletinScolaire, ClasseBulletin, FicheBourse, FicheDonnees, FicheHebergement, FicheIdentite,
    FicheInternat, FichePiecesJustificatives, FicheReglement, FicheScolarite,
    FicheScolariteAnterieure, OptionChoisie, PieceJointe, Regime,
};
pub use lifecycle::{annuler_toutes, create_or_update_applicable, terminer_toutes};
pub use validite::ContexteValidation;

/// The fiche kinds, in the order they are presented to candidates.
/// The derived `Ord` follows this declaration order on purpose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FicheKind {
    Identite,
    ScolariteAnterieure,
    Scolarite,
    Hebergement,
    Internat,
    Cesure,
    Bourse,
    Reglement,
    PiecesJustificatives,
}

impl FicheKind {
    pub const ORDRE: [Self; 9] = [
        Self::Identite,
        Self::ScolariteAnterieure,
        Self::Scolarite,
        Self::Hebergement,
        Self::Internat,
        Self::Cesure,
        Self::Bourse,
        Self::Reglement,
        Self::PiecesJustificatives,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identite => "Identité",
            Self::ScolariteAnterieure => "Scolarité antérieure",
            Self::Scolarite => "Choix des options",
            Self::Hebergement => "Mode d'hébergement",
            Self::Internat => "Internat",
            Self::Cesure => "Demande de césure",
            Self::Bourse => "Bourse du supérieur",
            Self::Reglement => "Règlement intérieur",
            Self::PiecesJustificatives => "Pièces justificatives",
        }
    }

    /// Whether this kind is requested for the dossier built on `voeu`.
    /// Most kinds always are; the boarding and gap-year fiches only exist
    /// when the wish carries the matching flag.
    pub fn applicable(self, voeu: &Voeu) -> bool {
        match self {
            Self::Internat => voeu.internat,
            Self::Cesure => voeu.cesure,
            _ => true,
        }
    }

    /// Field names of the kind, as referenced by the excluded-field
    /// configuration. Kinds whose validity does not look at individual
    /// fields expose an empty schema.
    pub const fn champs(self) -> &'static [&'static str] {
        match self {
            Self::Identite => &[
                "photo",
                "piece_identite",
                "commune_naissance",
                "commune_naissance_etranger",
                "pays_naissance",
                "adresse",
                "ville",
                "pays",
                "telephone",
            ],
            Self::ScolariteAnterieure => &[
                "etablissement",
                "classe_terminale",
                "specialite_terminale",
                "autre_formation",
                "bulletins",
            ],
            Self::Scolarite => &[],
            Self::Hebergement => &["regime", "iban", "bic", "titulaire_compte"],
            Self::Internat => &["message"],
            Self::Cesure => &[],
            Self::Bourse => &[
                "boursier",
                "echelon",
                "enfants_charge",
                "enfants_secondaire",
                "enfants_etablissement",
                "attribution_bourse",
            ],
            Self::Reglement => &["signature_reglement", "autorisation_parents_eleves"],
            Self::PiecesJustificatives => &[],
        }
    }
}

impl fmt::Display for FicheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FicheId(pub u64);

impl fmt::Display for FicheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a fiche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtatFiche {
    Edition,
    Confirmee,
    Terminee,
    Annulee,
}

impl EtatFiche {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Edition => "fiche à compléter",
            Self::Confirmee => "fiche confirmée",
            Self::Terminee => "validée par le gestionnaire",
            Self::Annulee => "annulée",
        }
    }
}

/// Who is driving a state transition. Candidates and staff do not have the
/// same rights on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acteur {
    Candidat,
    Gestionnaire,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FicheError {
    #[error("transition impossible depuis l'état « {} »", .de.label())]
    TransitionInvalide { de: EtatFiche },
    #[error("action réservée au gestionnaire")]
    ReserveGestionnaire,
}

/// One fiche of a candidate's dossier. `valide` is recomputed on every save
/// and never set by hand; `etat` only moves through the methods below or
/// through the reconciliation in [`lifecycle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiche {
    pub id: FicheId,
    pub candidat: NumeroDossier,
    pub etat: EtatFiche,
    pub valide: bool,
    pub donnees: FicheDonnees,
}

impl Fiche {
    pub fn nouvelle(id: FicheId, candidat: NumeroDossier, kind: FicheKind, voeu: &Voeu) -> Self {
        Self {
            id,
            candidat,
            etat: EtatFiche::Edition,
            valide: false,
            donnees: FicheDonnees::vierge(kind, voeu),
        }
    }

    pub fn kind(&self) -> FicheKind {
        self.donnees.kind()
    }

    /// Whether the fiche can be reused for `voeu` although it may have been
    /// created from another wish. The option-selection fiche refuses a wish
    /// pointing at a different formation; everything else carries over.
    pub fn recyclable(&self, voeu: &Voeu) -> bool {
        match &self.donnees {
            FicheDonnees::Scolarite(scolarite) => scolarite.formation == voeu.formation,
            _ => true,
        }
    }

    /// Candidate or staff locks the fiche for review.
    pub fn confirmer(&mut self, _acteur: Acteur) -> Result<(), FicheError> {
        match self.etat {
            EtatFiche::Edition | EtatFiche::Confirmee => {
                self.etat = EtatFiche::Confirmee;
                Ok(())
            }
            de => Err(FicheError::TransitionInvalide { de }),
        }
    }

    /// Staff-only final validation.
    pub fn terminer(&mut self, acteur: Acteur) -> Result<(), FicheError> {
        if acteur != Acteur::Gestionnaire {
            return Err(FicheError::ReserveGestionnaire);
        }
        match self.etat {
            EtatFiche::Confirmee | EtatFiche::Terminee => {
                self.etat = EtatFiche::Terminee;
                Ok(())
            }
            de => Err(FicheError::TransitionInvalide { de }),
        }
    }

    /// Back to edition. Staff can reopen anything but an annulée fiche
    /// (those only come back through recycling); a candidate can only undo
    /// their own confirmation.
    pub fn rouvrir(&mut self, acteur: Acteur) -> Result<(), FicheError> {
        match (acteur, self.etat) {
            (_, EtatFiche::Edition) => Ok(()),
            (_, EtatFiche::Annulee) => Err(FicheError::TransitionInvalide {
                de: EtatFiche::Annulee,
            }),
            (Acteur::Gestionnaire, _) | (Acteur::Candidat, EtatFiche::Confirmee) => {
                self.etat = EtatFiche::Edition;
                Ok(())
            }
            (Acteur::Candidat, EtatFiche::Terminee) => Err(FicheError::ReserveGestionnaire),
        }
    }

    /// Recompute the validity flag. Called on every save; never cached
    /// across saves.
    pub fn valider(&mut self, contexte: &ContexteValidation<'_>) {
        self.valide = validite::evaluer(&self.donnees, contexte);
    }
}
