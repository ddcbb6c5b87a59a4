//! Bridges between Parcoursup encodings and the local model.

use crate::workflows::inscription::domain::EtatVoeu;
use crate::workflows::inscription::parametrage::Pays;
use crate::workflows::inscription::repository::Parametrage;

use super::payload::CodeSituation;

/// Admission-state bridge.
///
/// The remote codes and the internal discriminants happen to overlap
/// numerically, but NOT identically: remote code 1 is "acceptée
/// définitivement" while the internal state at discriminant 1 is "accepté
/// avec autres vœux". Always go through this table; a renumbering on the
/// vendor side must break a test here, not the dossiers.
pub fn etat_voeu(code: CodeSituation) -> EtatVoeu {
    match code {
        CodeSituation::EnAttente => EtatVoeu::Attente,
        CodeSituation::AccepteeDefinitivement => EtatVoeu::AccepteDefinitif,
        CodeSituation::AccepteeAutresVoeux => EtatVoeu::AccepteAutres,
        CodeSituation::Refusee => EtatVoeu::Refuse,
    }
}

/// Country lookup for the codes Parcoursup attaches to addresses, birth
/// places, and nationality. The API documents an ISO-2 code but has been
/// observed sending the numeric INSEE code instead; both are tried, in that
/// order, and a total miss yields `None`; downstream enrichment tolerates
/// the hole.
pub fn resoudre_pays(parametrage: &dyn Parametrage, code: Option<&str>) -> Option<Pays> {
    let code = code?.trim();
    if code.is_empty() {
        return None;
    }
    parametrage
        .pays_par_iso2(code)
        .or_else(|| parametrage.pays_par_insee(code))
}
