use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;

use admissup::error::AppError;
use admissup::workflows::inscription::{
    CodeFormation, DossierStore, EtatFiche, ImportService, NumeroDossier,
};
use admissup::workflows::parcoursup::{parse_admission, parse_export};

use crate::infra::{
    parametrage_demonstration, CourrierJournalise, MemoireDossiers, Service,
};

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export file produced by Parcoursup
    #[arg(long)]
    pub(crate) fichier: PathBuf,
    /// UAI of the receiving etablissement
    #[arg(long)]
    pub(crate) etablissement: String,
    /// Parcoursup code of the formation the export belongs to
    #[arg(long)]
    pub(crate) formation: i32,
}

fn service_memoire() -> (Arc<Service>, Arc<MemoireDossiers>, Arc<CourrierJournalise>) {
    let store = Arc::new(MemoireDossiers::default());
    let courrier = Arc::new(CourrierJournalise::default());
    let service = Arc::new(ImportService::new(
        store.clone(),
        Arc::new(parametrage_demonstration()),
        courrier.clone(),
    ));
    (service, store, courrier)
}

/// Batch-import a CSV export, skip-and-log style, and print the bilan.
pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let fichier = std::fs::File::open(&args.fichier)?;
    let admissions = parse_export(
        fichier,
        &args.etablissement,
        CodeFormation(args.formation),
    )?;

    let (service, _, _) = service_memoire();
    let bilan = service.importer_lot(admissions);

    println!(
        "Import terminé: {} dossier(s) importé(s), {} rejet(s)",
        bilan.importes,
        bilan.rejets.len()
    );
    for rejet in &bilan.rejets {
        println!("  - {}: {}", rejet.reference, rejet.erreur);
    }
    Ok(())
}

/// End-to-end walk-through: a push message lands, the dossier appears, the
/// wish changes, the fiches follow.
pub(crate) fn run_demo() -> Result<(), AppError> {
    let (service, store, courrier) = service_memoire();

    let message = json!({
        "codeCandidat": "4521",
        "nom": "Durand",
        "prenom": "Camille",
        "mail": "camille.durand@example.org",
        "sexe": "F",
        "dateNaissance": "12/07/2003",
        "adresse1": "12 rue des Lilas",
        "codePostal": "75011",
        "libelleCommune": "Paris",
        "telmobile": "0612345678",
        "codeCommune": "75111",
        "codePaysAdresse": "99100",
        "codeFormationPsup": 1234,
        "codeEtablissementAffectation": "0123456A",
        "codeSituation": "2",
        "cesure": "0",
        "internat": "1",
        "dateReponse": "02/06/2024 14:35",
        "nomRL1": "Durand",
        "prenomRL1": "Michel",
        "mailRL1": "michel.durand@example.org",
        "telRL1": "0145678901",
    });

    println!("== Notification d'admission (acceptée, autres vœux en attente) ==");
    let admission = parse_admission(&message)?;
    service.import_admission(&admission)?;
    imprimer_dossier(&store, 4521);

    println!("\n== Le candidat accepte définitivement, sans internat ==");
    let mut message = message;
    message["codeSituation"] = json!("1");
    message["internat"] = json!("0");
    // The boarding flag is part of the wish key: the earlier combination
    // must be resigned first.
    let mut demission = message.clone();
    demission["codeSituation"] = json!("3");
    demission["internat"] = json!("1");
    let demission = parse_admission(&demission)?;
    service.import_admission(&demission)?;
    let admission = parse_admission(&message)?;
    service.import_admission(&admission)?;
    imprimer_dossier(&store, 4521);

    println!(
        "\nCourriels sortants journalisés: {}",
        courrier.envoyes().len()
    );
    Ok(())
}

fn imprimer_dossier(store: &MemoireDossiers, numero: u32) {
    let Ok(Some(dossier)) = store.charger(NumeroDossier(numero)) else {
        println!("dossier {numero} absent");
        return;
    };

    println!(
        "Candidat {} : {} ({})",
        dossier.candidat.dossier,
        dossier.candidat.nom_complet(),
        dossier.candidat.compte.email
    );
    match dossier.voeu_actuel() {
        Ok(voeu) => println!(
            "Vœu actuel: formation {}, internat={}, {}",
            voeu.formation,
            voeu.internat,
            voeu.etat.label()
        ),
        Err(erreur) => println!("Vœu actuel: {erreur}"),
    }
    for fiche in &dossier.fiches {
        if fiche.etat == EtatFiche::Annulee {
            continue;
        }
        println!(
            "  [{}] {} : {}{}",
            fiche.id,
            fiche.kind().label(),
            fiche.etat.label(),
            if fiche.valide { " (complète)" } else { "" }
        );
    }
    println!("Historique: {} transition(s) de vœu", dossier.historique.len());
}
