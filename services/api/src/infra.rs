//! In-memory adapters behind the library's storage and gateway traits, plus
//! the referential seed the service boots with. A relational store and an
//! SMTP relay slot in behind the same traits in production.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use admissup::workflows::inscription::{
    AccesParcoursup, ChampsExclus, CodeFormation, Commune, Courriel, CourrielError, Dossier,
    DossierStore, Etablissement, FicheKind, Formation, ImportService, MailGateway, MefMatiere,
    MefOption, Modalite, NumeroDossier, Parametrage, Pays, StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Service = ImportService<MemoireDossiers, ParametrageMemoire, CourrierJournalise>;

#[derive(Default)]
pub(crate) struct MemoireDossiers {
    dossiers: Mutex<HashMap<NumeroDossier, Dossier>>,
}

impl DossierStore for MemoireDossiers {
    fn charger(&self, dossier: NumeroDossier) -> Result<Option<Dossier>, StoreError> {
        let guard = self.dossiers.lock().expect("mutex des dossiers");
        Ok(guard.get(&dossier).cloned())
    }

    fn sauvegarder(&self, dossier: Dossier) -> Result<(), StoreError> {
        let mut guard = self.dossiers.lock().expect("mutex des dossiers");
        guard.insert(dossier.candidat.dossier, dossier);
        Ok(())
    }

    fn tous(&self) -> Result<Vec<Dossier>, StoreError> {
        let guard = self.dossiers.lock().expect("mutex des dossiers");
        let mut dossiers: Vec<Dossier> = guard.values().cloned().collect();
        dossiers.sort_by_key(|dossier| dossier.candidat.dossier);
        Ok(dossiers)
    }
}

/// Referential held in memory: etablissements, formations, reference
/// tables, credentials.
#[derive(Default)]
pub(crate) struct ParametrageMemoire {
    pub(crate) etablissements: HashMap<String, Etablissement>,
    pub(crate) formations: HashMap<CodeFormation, Formation>,
    pub(crate) communes: HashMap<String, Commune>,
    pub(crate) pays: Vec<Pays>,
    pub(crate) lycees_origine: HashMap<String, String>,
    pub(crate) acces: Vec<AccesParcoursup>,
}

impl Parametrage for ParametrageMemoire {
    fn etablissement(&self, uai: &str) -> Option<Etablissement> {
        self.etablissements.get(uai).cloned()
    }

    fn formation(&self, code: CodeFormation) -> Option<Formation> {
        self.formations.get(&code).cloned()
    }

    fn commune(&self, code_insee: &str) -> Option<Commune> {
        self.communes.get(code_insee).cloned()
    }

    fn pays_par_iso2(&self, code: &str) -> Option<Pays> {
        self.pays.iter().find(|pays| pays.code_iso2 == code).cloned()
    }

    fn pays_par_insee(&self, code: &str) -> Option<Pays> {
        self.pays.iter().find(|pays| pays.num_insee == code).cloned()
    }

    fn etablissement_origine(&self, uai: &str) -> Option<String> {
        self.lycees_origine.get(uai).cloned()
    }

    fn authentifier_entrant(&self, login: &str, password: &str) -> Option<String> {
        self.acces
            .iter()
            .find(|acces| acces.entrant_login == login && acces.entrant_password == password)
            .map(|acces| acces.etablissement.clone())
    }

    fn acces(&self, uai: &str) -> Option<AccesParcoursup> {
        self.acces
            .iter()
            .find(|acces| acces.etablissement == uai)
            .cloned()
    }
}

/// Gateway that journals outbound messages instead of relaying them;
/// delivery mechanics are an external collaborator.
#[derive(Default)]
pub(crate) struct CourrierJournalise {
    envoyes: Mutex<Vec<Courriel>>,
}

impl CourrierJournalise {
    pub(crate) fn envoyes(&self) -> Vec<Courriel> {
        self.envoyes.lock().expect("mutex du courrier").clone()
    }
}

impl MailGateway for CourrierJournalise {
    fn envoyer(&self, courriel: &Courriel) -> Result<(), CourrielError> {
        info!(a = %courriel.a, sujet = %courriel.sujet, "courriel sortant journalisé");
        self.envoyes
            .lock()
            .expect("mutex du courrier")
            .push(courriel.clone());
        Ok(())
    }
}

/// Referential seed used by `serve` and `demo` until institution setup is
/// wired to real imports (UAI structure + option catalog files).
pub(crate) fn parametrage_demonstration() -> ParametrageMemoire {
    let uai = "0123456A".to_string();
    let mut parametrage = ParametrageMemoire::default();

    parametrage.etablissements.insert(
        uai.clone(),
        Etablissement {
            uai: uai.clone(),
            nom: "Lycée Condorcet".to_string(),
            email: "inscriptions@condorcet.example.org".to_string(),
            email_pieces_justificatives: "pieces@condorcet.example.org".to_string(),
            email_technique: "technique@condorcet.example.org".to_string(),
            inscriptions: true,
            fiches: FicheKind::ORDRE.iter().copied().collect::<BTreeSet<_>>(),
            champs_exclus: ChampsExclus::default(),
        },
    );

    let option = |code: &str, libelle: &str, modalite: Modalite, rang: u8| MefOption {
        matiere: MefMatiere {
            code: code.to_string(),
            libelle: libelle.to_string(),
        },
        modalite,
        rang,
        inscriptions: true,
    };

    parametrage.formations.insert(
        CodeFormation(1234),
        Formation {
            code_parcoursup: CodeFormation(1234),
            nom: "MPSI".to_string(),
            etablissement: uai.clone(),
            groupe_parcoursup: 1,
            code_mef: "30112012210".to_string(),
            slug: "mpsi".to_string(),
            email_pieces_justificatives: String::new(),
            options: vec![
                option("LV2-ALL", "Allemand LV2", Modalite::Obligatoire, 1),
                option("LV2-ESP", "Espagnol LV2", Modalite::Obligatoire, 1),
                option("SI", "Sciences de l'ingénieur", Modalite::Obligatoire, 2),
                option("LATIN", "Latin", Modalite::Facultative, 3),
            ],
            pieces_attendues: Vec::new(),
        },
    );

    for (code, nom) in [("75111", "Paris 11e"), ("75112", "Paris 12e")] {
        parametrage.communes.insert(
            code.to_string(),
            Commune {
                code_insee: code.to_string(),
                nom: nom.to_string(),
            },
        );
    }

    parametrage.pays.push(Pays {
        code_iso2: "FR".to_string(),
        num_insee: "99100".to_string(),
        libelle: "France".to_string(),
    });

    parametrage
        .lycees_origine
        .insert("0750699D".to_string(), "Lycée Voltaire".to_string());

    parametrage.acces.push(AccesParcoursup {
        etablissement: uai,
        entrant_login: "psup-entrant".to_string(),
        entrant_password: "entrant-secret".to_string(),
        sortant_login: "psup-sortant".to_string(),
        sortant_password: "sortant-secret".to_string(),
    });

    parametrage
}
