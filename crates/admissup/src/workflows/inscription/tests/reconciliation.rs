use super::common::{
    admission, etablissement_complet, parametrage_avec, service, service_avec, FORMATION_MPSI,
    FORMATION_PCSI,
};
use crate::workflows::inscription::domain::NumeroDossier;
use crate::workflows::inscription::repository::DossierStore;
use crate::workflows::inscription::fiches::{Acteur, EtatFiche, FicheDonnees, FicheKind, Regime};

#[test]
fn chaque_kind_applicable_a_exactement_une_fiche_vivante() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", true))
        .expect("admission avec internat");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");

    for kind in FicheKind::ORDRE {
        let vivantes = dossier
            .fiches
            .iter()
            .filter(|fiche| fiche.kind() == kind && fiche.etat != EtatFiche::Annulee)
            .count();
        // The wish requests boarding but no gap year.
        let attendu = usize::from(kind != FicheKind::Cesure);
        assert_eq!(vivantes, attendu, "fiche {kind}");
    }
}

#[test]
fn changement_de_formation_remplace_la_fiche_options() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission MPSI");

    // The candidate resigns, then accepts the other formation.
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "3", false))
        .expect("démission");
    service
        .import_admission(&admission(4521, FORMATION_PCSI, "1", false))
        .expect("admission PCSI");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");

    // The old option-selection fiche stays annulled for history; the live
    // one is bound to the new formation.
    let fiches_options: Vec<_> = dossier
        .fiches
        .iter()
        .filter(|fiche| fiche.kind() == FicheKind::Scolarite)
        .collect();
    assert_eq!(fiches_options.len(), 2);

    let vivante = dossier
        .fiche(FicheKind::Scolarite)
        .expect("fiche options vivante");
    match &vivante.donnees {
        FicheDonnees::Scolarite(scolarite) => {
            assert_eq!(scolarite.formation, FORMATION_PCSI);
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }
    assert!(fiches_options
        .iter()
        .any(|fiche| fiche.etat == EtatFiche::Annulee));
}

#[test]
fn les_saisies_survivent_a_une_demission_suivie_dun_retablissement() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");

    // The candidate fills in part of the identity fiche...
    let mut dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    let fiche = dossier
        .fiche_mut(FicheKind::Identite)
        .expect("fiche identité");
    match &mut fiche.donnees {
        FicheDonnees::Identite(identite) => {
            identite.commune_naissance_etranger = "Genève".to_string();
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }
    store.sauvegarder(dossier).expect("sauvegarde");

    // ...resigns by mistake, and the lycée reinstates the wish.
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "3", false))
        .expect("démission");
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("rétablissement");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    let fiche = dossier.fiche(FicheKind::Identite).expect("fiche recyclée");
    assert_eq!(fiche.etat, EtatFiche::Edition);
    match &fiche.donnees {
        FicheDonnees::Identite(identite) => {
            assert_eq!(identite.commune_naissance_etranger, "Genève");
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }
}

#[test]
fn une_fiche_confirmee_revient_en_edition_apres_recyclage() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");

    let mut dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    let fiche = dossier.fiche_mut(FicheKind::Bourse).expect("fiche bourse");
    fiche
        .confirmer(Acteur::Candidat)
        .expect("confirmation");
    store.sauvegarder(dossier).expect("sauvegarde");

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "2", false))
        .expect("nouvelle notification");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(
        dossier.fiche(FicheKind::Bourse).expect("fiche bourse").etat,
        EtatFiche::Edition
    );
}

#[test]
fn une_fiche_terminee_nest_pas_remise_en_edition() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");

    let mut dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    let fiche = dossier.fiche_mut(FicheKind::Bourse).expect("fiche bourse");
    fiche
        .confirmer(Acteur::Candidat)
        .expect("confirmation");
    fiche
        .terminer(Acteur::Gestionnaire)
        .expect("validation");
    store.sauvegarder(dossier).expect("sauvegarde");

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "2", false))
        .expect("nouvelle notification");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert_eq!(
        dossier.fiche(FicheKind::Bourse).expect("fiche bourse").etat,
        EtatFiche::Terminee
    );
}

#[test]
fn la_liste_presentee_par_letablissement_restreint_les_fiches() {
    let mut etablissement = etablissement_complet();
    etablissement.fiches.remove(&FicheKind::Bourse);
    let (service, store, _) = service_avec(parametrage_avec(etablissement));

    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", false))
        .expect("admission");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");
    assert!(dossier.fiche(FicheKind::Bourse).is_none());
    assert!(dossier.fiche(FicheKind::Identite).is_some());
}

#[test]
fn le_prefill_parcoursup_renseigne_les_fiches() {
    let (service, store, _) = service();
    service
        .import_admission(&admission(4521, FORMATION_MPSI, "1", true))
        .expect("admission avec internat");

    let dossier = store
        .charger(NumeroDossier(4521))
        .expect("store disponible")
        .expect("dossier présent");

    match &dossier
        .fiche(FicheKind::Identite)
        .expect("fiche identité")
        .donnees
    {
        FicheDonnees::Identite(identite) => {
            assert_eq!(identite.ville.as_deref(), Some("75111"));
            assert_eq!(identite.commune_naissance.as_deref(), Some("75112"));
            // INSEE numeric country code resolved through the fallback.
            assert_eq!(identite.pays_naissance.as_deref(), Some("FR"));
            assert_eq!(identite.telephone, "0612345678");
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }

    match &dossier
        .fiche(FicheKind::ScolariteAnterieure)
        .expect("fiche scolarité antérieure")
        .donnees
    {
        FicheDonnees::ScolariteAnterieure(scolarite) => {
            assert_eq!(scolarite.etablissement.as_deref(), Some("0750699D"));
            assert_eq!(scolarite.specialite_terminale, "Générale");
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }

    match &dossier
        .fiche(FicheKind::Hebergement)
        .expect("fiche hébergement")
        .donnees
    {
        FicheDonnees::Hebergement(hebergement) => {
            assert_eq!(
                hebergement.regime,
                Some(Regime::Interne)
            );
        }
        autre => panic!("payload inattendu: {autre:?}"),
    }
}
