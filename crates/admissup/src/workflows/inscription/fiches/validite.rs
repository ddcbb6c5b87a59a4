//! Validity rules, one per fiche kind.
//!
//! An invalid fiche is a normal state ("dossier incomplet"), not an error.
//! Every rule consults the etablissement's excluded-field table: an
//! excluded field no longer conditions validity.

use std::collections::BTreeSet;

use super::super::parametrage::{Etablissement, Formation, Modalite};
use super::donnees::{
    FicheBourse, FicheDonnees, FicheHebergement, FicheIdentite, FichePiecesJustificatives,
    FicheReglement, FicheScolarite, FicheScolariteAnterieure,
};
use super::FicheKind;

/// What a validity check is allowed to look at besides the fiche itself.
#[derive(Debug, Clone, Copy)]
pub struct ContexteValidation<'a> {
    pub etablissement: &'a Etablissement,
    pub formation: &'a Formation,
}

impl ContexteValidation<'_> {
    fn requis(&self, kind: FicheKind, champ: &str) -> bool {
        self.etablissement.champs_exclus.requis(kind, champ)
    }
}

pub(super) fn evaluer(donnees: &FicheDonnees, contexte: &ContexteValidation<'_>) -> bool {
    match donnees {
        FicheDonnees::Identite(identite) => valider_identite(identite, contexte),
        FicheDonnees::ScolariteAnterieure(scolarite) => {
            valider_scolarite_anterieure(scolarite, contexte)
        }
        FicheDonnees::Scolarite(scolarite) => valider_options(scolarite, contexte),
        FicheDonnees::Hebergement(hebergement) => valider_hebergement(hebergement, contexte),
        FicheDonnees::Bourse(bourse) => valider_bourse(bourse, contexte),
        FicheDonnees::Reglement(reglement) => valider_reglement(reglement, contexte),
        FicheDonnees::PiecesJustificatives(pieces) => valider_pieces(pieces, contexte),
        // No completion criteria: vacuously valid.
        FicheDonnees::Internat(_) | FicheDonnees::Cesure => true,
    }
}

fn valider_identite(identite: &FicheIdentite, contexte: &ContexteValidation<'_>) -> bool {
    let kind = FicheKind::Identite;
    let commune_ok = identite.commune_naissance.is_some()
        || !identite.commune_naissance_etranger.is_empty();

    (!contexte.requis(kind, "photo") || identite.photo.is_some())
        && (!contexte.requis(kind, "piece_identite") || identite.piece_identite.is_some())
        && (!contexte.requis(kind, "commune_naissance") || commune_ok)
        && (!contexte.requis(kind, "pays_naissance") || identite.pays_naissance.is_some())
}

fn valider_scolarite_anterieure(
    scolarite: &FicheScolariteAnterieure,
    contexte: &ContexteValidation<'_>,
) -> bool {
    let kind = FicheKind::ScolariteAnterieure;
    let origine_ok = scolarite.etablissement.is_some() || !scolarite.autre_formation.is_empty();

    (!contexte.requis(kind, "etablissement") || origine_ok)
        && (!contexte.requis(kind, "classe_terminale") || !scolarite.classe_terminale.is_empty())
        && (!contexte.requis(kind, "specialite_terminale")
            || !scolarite.specialite_terminale.is_empty())
        && (!contexte.requis(kind, "bulletins") || !scolarite.bulletins.is_empty())
}

/// All obligatory ranks must be covered, exactly once each. Two selections
/// sharing an obligatory rank are a conflict, not redundancy.
fn valider_options(scolarite: &FicheScolarite, contexte: &ContexteValidation<'_>) -> bool {
    let rangs_disponibles = contexte.formation.rangs_obligatoires();
    let mut rangs_choisis = BTreeSet::new();

    for option in &scolarite.options {
        if option.modalite != Modalite::Obligatoire {
            continue;
        }
        if !rangs_choisis.insert(option.rang) {
            return false;
        }
    }

    rangs_disponibles == rangs_choisis
}

fn valider_hebergement(hebergement: &FicheHebergement, contexte: &ContexteValidation<'_>) -> bool {
    !contexte.requis(FicheKind::Hebergement, "regime") || hebergement.regime.is_some()
}

fn valider_bourse(bourse: &FicheBourse, contexte: &ContexteValidation<'_>) -> bool {
    if !bourse.boursier {
        return true;
    }
    let kind = FicheKind::Bourse;
    (!contexte.requis(kind, "echelon") || bourse.echelon.is_some())
        && (!contexte.requis(kind, "attribution_bourse") || bourse.attribution_bourse.is_some())
}

fn valider_reglement(reglement: &FicheReglement, contexte: &ContexteValidation<'_>) -> bool {
    !contexte.requis(FicheKind::Reglement, "signature_reglement")
        || reglement.signature_reglement.is_some()
}

fn valider_pieces(
    pieces: &FichePiecesJustificatives,
    contexte: &ContexteValidation<'_>,
) -> bool {
    contexte
        .formation
        .pieces_attendues
        .iter()
        .all(|attendue| pieces.recues.contains(&attendue.code))
}
