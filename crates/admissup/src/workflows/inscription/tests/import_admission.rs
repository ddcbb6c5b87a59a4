use super::common::{
    admission, message_admission, service, ServiceDeTest, FORMATION_MPSI, FORMATION_PCSI,
};
use crate::workflows::inscription::domain::{CodeFormation, EtatVoeu, NumeroDossier};
use crate::workflows::inscription::fiches::{EtatFiche, FicheKind};
use crate::workflows::inscription::repository::DossierStore;
use crate::workflows::inscription::import::ImportError;
use crate::workflows::parcoursup::payload::PayloadError;

fn kinds_vivants(service: &ServiceDeTest, candidat: u32) -> Vec<FicheKind> {
    let dossier = service
        .store()
        .charger(NumeroDossier(candidat))
        .expect("store disponible")
        .expect("dossier présent");
    let mut kinds: Vec<FicheKind> = dossier
        .fiches
        .iter()
        .filter(|fiche| fiche.etat != EtatFiche::Annulee)
        .map(|fiche| fiche.kind())
        .collect();
    kinds.sort();
    kinds
}

#[test]
fn admission_definitive_cree_le_dossier_complet() {
    let (service, store, _) = service();

    let candidat = service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("import accepté");

    assert_eq!(candidat.dossier, NumeroDossier(4521));
    assert_eq!(candidat.nom, "Durand");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier créé");
    let voeu = dossier.voeu_actuel().expect("un vœu accepté");
    assert_eq!(voeu.etat, EtatVoeu::AccepteDefinitif);
    assert!(!voeu.internat);
    assert_eq!(dossier.responsables.len(), 1);

    // Boarding and gap-year fiches are absent: their predicates are false.
    let kinds = kinds_vivants(&service, 4521);
    assert!(kinds.contains(&FicheKind::Identite));
    assert!(kinds.contains(&FicheKind::ScolariteAnterieure));
    assert!(kinds.contains(&FicheKind::Scolarite));
    assert!(kinds.contains(&FicheKind::Bourse));
    assert!(kinds.contains(&FicheKind::Reglement));
    assert!(!kinds.contains(&FicheKind::Internat));
    assert!(!kinds.contains(&FicheKind::Cesure));
    assert!(dossier
        .fiches
        .iter()
        .filter(|fiche| fiche.etat != EtatFiche::Annulee)
        .all(|fiche| fiche.etat == EtatFiche::Edition));
}

#[test]
fn import_repete_est_idempotent() {
    let (service, store, courrier) = service();
    let message = admission(4521, FORMATION_MPSI, "1", false);

    service.import_admission(&message).expect("premier import");
    let premier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier créé");

    service.import_admission(&message).expect("second import");
    let second = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier conservé");

    assert_eq!(premier, second);
    assert!(second.historique.is_empty());
    assert_eq!(second.responsables.len(), 1);
    // One welcome message, not one per notification.
    assert_eq!(courrier.envoyes().len(), 1);
}

#[test]
fn changement_detat_journalise_l_ancien_etat() {
    let (service, store, _) = service();

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "2", false))
        .expect("acceptation provisoire");
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("acceptation définitive");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(dossier.historique.len(), 1);
    assert_eq!(dossier.historique[0].etat, EtatVoeu::AccepteAutres);
    assert_eq!(
        dossier.voeu_actuel().expect("vœu accepté").etat,
        EtatVoeu::AccepteDefinitif
    );
}

#[test]
fn demission_annule_toutes_les_fiches() {
    let (service, store, _) = service();

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "3", false))
        .expect("démission");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert!(dossier.voeu_actuel().is_err());
    assert!(dossier
        .fiches
        .iter()
        .all(|fiche| fiche.etat == EtatFiche::Annulee));
    // The candidate row survives the resignation.
    assert_eq!(dossier.candidat.nom, "Durand");
}

#[test]
fn les_responsables_ne_sont_jamais_ecrases() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("premier import");

    // Staff corrects the guardian through the UI.
    let mut dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    dossier.responsables[0].telephone = "0699999999".to_string();
    store.sauvegarder(dossier).expect("sauvegarde");

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("resynchronisation");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(dossier.responsables.len(), 1);
    assert_eq!(dossier.responsables[0].telephone, "0699999999");
}

#[test]
fn formation_inconnue_est_fatale_au_seul_enregistrement() {
    let (service, store, _) = service();

    let erreur = service
        .import_admission(&admission(4521, CodeFormation(9999), "1", false))
        .expect_err("formation absente du paramétrage");
    assert!(matches!(erreur, ImportError::FormationInconnue { .. }));
    assert!(store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .is_none());
}

#[test]
fn importer_lot_poursuit_apres_un_rejet() {
    let (service, _, _) = service();

    let lot: Vec<Result<_, PayloadError>> = vec![
        Ok(admission(1, CodeFormation(9999), "1", false)),
        Err(PayloadError::ChampManquant {
            champ: "codeCandidat".to_string(),
        }),
        Ok(admission(4521, FORMATION_MPSI, "1", false)),
    ];

    let bilan = service.importer_lot(lot);
    assert_eq!(bilan.importes, 1);
    assert_eq!(bilan.rejets.len(), 2);
}

#[test]
fn deux_voeux_acceptes_font_echouer_l_import_sans_rien_persister() {
    let (service, store, _) = service();

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("première admission");
    let avant = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");

    // A second acceptance on another formation without a prior resignation
    // breaks the current-wish invariant.
    let erreur = service
        .import_admission(&admission(4521, FORMATION_PCSI, "1", false))
        .expect_err("anomalie détectée");
    assert!(matches!(
        erreur,
        ImportError::VoeuxMultiples { nombre: 2, .. }
    ));

    let apres = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(avant, apres);
}

#[test]
fn email_bienvenue_rejoue_au_prochain_import_en_cas_dechec() {
    let (service, store, courrier) = service();
    courrier.refuser("candidat-4521@example.org");

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("import malgré le courrier en panne");
    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert!(!dossier.candidat.email_bienvenue_envoye);

    courrier.accepter("candidat-4521@example.org");
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("nouvelle notification");
    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert!(dossier.candidat.email_bienvenue_envoye);
    assert_eq!(courrier.envoyes().len(), 1);
}

#[test]
fn confirmation_administrative_exige_un_candidat_connu() {
    let (service, store, _) = service();

    let erreur = service
        .enregistrer_confirmation(NumeroDossier(4521), "inscription principale")
        .expect_err("candidat inconnu");
    assert!(matches!(erreur, ImportError::CandidatInconnu { .. }));

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");
    let candidat = service
        .enregistrer_confirmation(NumeroDossier(4521), "inscription principale")
        .expect("confirmation enregistrée");
    assert!(candidat.inscription_confirmee);
    assert_eq!(candidat.message_confirmation, "inscription principale");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert!(dossier.candidat.inscription_confirmee);
}

#[test]
fn les_champs_didentite_sont_ecrases_a_chaque_notification() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("premier import");

    let mut message = message_admission(4521, FORMATION_MPSI, "1", false);
    message["nom"] = serde_json::json!("Durand-Leroy");
    let admission = crate::workflows::parcoursup::payload::parse_admission(&message)
        .expect("message valide");
    service.import_admission(&admission).expect("second import");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(dossier.candidat.nom, "Durand-Leroy");
}
