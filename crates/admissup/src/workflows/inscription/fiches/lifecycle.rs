//! Reconciliation of a candidate's fiche set against their current wish.
//!
//! Re-running this after every Parcoursup notification is what keeps the
//! dossier in step with a changing wish (a candidate who resigns by mistake
//! and is reinstated, whose boarding flag flips, or who reappears through
//! the complementary procedure) without throwing away anything the
//! candidate already typed in, while cleanly retiring fiches that stopped
//! being relevant.

use std::collections::BTreeSet;

use crate::workflows::parcoursup::mapping::resoudre_pays;
use crate::workflows::parcoursup::payload::AdmissionParcoursup;

use super::super::domain::{Dossier, Voeu};
use super::super::parametrage::{Etablissement, Formation};
use super::super::repository::Parametrage;
use super::donnees::{FicheDonnees, Regime};
use super::validite::ContexteValidation;
use super::{EtatFiche, Fiche, FicheId, FicheKind};

/// Reconcile the fiche set with `voeu`.
///
/// Existing fiches whose kind is still applicable and which accept the new
/// wish are kept (brought back to édition if they were confirmed or
/// annulled); everything else is annulled. Missing applicable kinds are
/// created blank. When an admission payload is at hand, the kept-or-created
/// fiches are pre-filled from it, every field assignment independently
/// best-effort. Validity is recomputed for every fiche that survives.
///
/// Returns the touched fiches as (id, newly_created) pairs.
pub fn create_or_update_applicable(
    dossier: &mut Dossier,
    voeu: Voeu,
    etablissement: &Etablissement,
    formation: &Formation,
    admission: Option<&AdmissionParcoursup>,
    parametrage: &dyn Parametrage,
) -> Vec<(FicheId, bool)> {
    let applicables: Vec<FicheKind> = FicheKind::ORDRE
        .into_iter()
        .filter(|kind| kind.applicable(&voeu) && etablissement.presente(*kind))
        .collect();

    let mut satisfaits: BTreeSet<FicheKind> = BTreeSet::new();
    let mut touchees: Vec<(FicheId, bool)> = Vec::new();

    // First pass: recycle what can be recycled, annul the rest. Annulled
    // fiches are candidates for resurrection here, and only here.
    for fiche in dossier.fiches.iter_mut() {
        let kind = fiche.kind();
        let reutilisable = applicables.contains(&kind)
            && !satisfaits.contains(&kind)
            && fiche.recyclable(&voeu);

        if reutilisable {
            if matches!(fiche.etat, EtatFiche::Confirmee | EtatFiche::Annulee) {
                fiche.etat = EtatFiche::Edition;
            }
            satisfaits.insert(kind);
            touchees.push((fiche.id, false));
        } else if fiche.etat != EtatFiche::Annulee {
            fiche.etat = EtatFiche::Annulee;
        }
    }

    // Second pass: instantiate the missing kinds.
    let mut prochain = dossier
        .fiches
        .iter()
        .map(|fiche| fiche.id.0)
        .max()
        .unwrap_or(0)
        + 1;
    for kind in &applicables {
        if satisfaits.contains(kind) {
            continue;
        }
        let id = FicheId(prochain);
        prochain += 1;
        dossier
            .fiches
            .push(Fiche::nouvelle(id, dossier.candidat.dossier, *kind, &voeu));
        touchees.push((id, true));
    }

    // Pre-fill from the admission payload, then recompute validity.
    let contexte = ContexteValidation {
        etablissement,
        formation,
    };
    for (id, _) in &touchees {
        let adresse_candidat = dossier.candidat.adresse.clone();
        let Some(fiche) = dossier.fiches.iter_mut().find(|fiche| fiche.id == *id) else {
            continue;
        };
        if let Some(admission) = admission {
            fiche.update_from_parcoursup(admission, &adresse_candidat, parametrage);
        }
        fiche.valider(&contexte);
    }

    touchees
}

/// Annul every live fiche: the dossier no longer hangs off any accepted
/// wish (resignation, or the last acceptance was withdrawn).
pub fn annuler_toutes(dossier: &mut Dossier) {
    for fiche in dossier.fiches.iter_mut() {
        fiche.etat = EtatFiche::Annulee;
    }
}

/// Staff bulk action: move every confirmed fiche the etablissement presents
/// to terminée. Returns how many fiches moved.
pub fn terminer_toutes(dossier: &mut Dossier, etablissement: &Etablissement) -> usize {
    let mut validees = 0;
    for fiche in dossier.fiches.iter_mut() {
        if fiche.etat == EtatFiche::Confirmee && etablissement.presente(fiche.kind()) {
            fiche.etat = EtatFiche::Terminee;
            validees += 1;
        }
    }
    validees
}

impl Fiche {
    /// Opportunistic pre-fill from a Parcoursup admission payload. Each
    /// assignment stands on its own: a reference-table miss on one field
    /// must not keep the next field from being filled.
    pub(crate) fn update_from_parcoursup(
        &mut self,
        admission: &AdmissionParcoursup,
        adresse_candidat: &str,
        parametrage: &dyn Parametrage,
    ) {
        let candidat = &admission.candidat;
        match &mut self.donnees {
            FicheDonnees::Identite(identite) => {
                if let Some(commune) = candidat
                    .code_commune
                    .as_deref()
                    .and_then(|code| parametrage.commune(code))
                {
                    identite.ville = Some(commune.code_insee);
                }
                if let Some(pays) = resoudre_pays(parametrage, candidat.code_pays.as_deref()) {
                    identite.pays = Some(pays.code_iso2);
                }
                if let Some(commune) = candidat
                    .commune_naissance
                    .as_deref()
                    .and_then(|code| parametrage.commune(code))
                {
                    identite.commune_naissance = Some(commune.code_insee);
                }
                if let Some(pays) =
                    resoudre_pays(parametrage, candidat.pays_naissance.as_deref())
                {
                    identite.pays_naissance = Some(pays.code_iso2);
                }
                identite.adresse = adresse_candidat.to_string();
                identite.telephone = candidat.telephone_mobile.clone();
            }
            FicheDonnees::ScolariteAnterieure(scolarite) => {
                if let Some(uai) = candidat.etablissement_origine_uai.as_deref() {
                    if parametrage.etablissement_origine(uai).is_some() {
                        scolarite.etablissement = Some(uai.to_string());
                    }
                }
                if scolarite.etablissement.is_none() {
                    if let Some(nom) = candidat.etablissement_origine_nom.as_deref() {
                        if !nom.is_empty() {
                            scolarite.autre_formation = nom.to_string();
                        }
                    }
                }
                scolarite.specialite_terminale =
                    candidat.bac_serie.clone().unwrap_or_default();
            }
            FicheDonnees::Hebergement(hebergement) => {
                if admission.proposition.internat {
                    hebergement.regime = Some(Regime::Interne);
                }
            }
            _ => {}
        }
    }
}
