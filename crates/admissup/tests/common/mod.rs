//! Shared fixtures for the integration suites: in-memory store, referential
//! and mail gateway wired onto the public service facade.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use admissup::workflows::inscription::{
    AccesParcoursup, ChampsExclus, CodeFormation, Commune, Courriel, CourrielError, Dossier,
    DossierStore, Etablissement, FicheKind, Formation, ImportService, MailGateway, MefMatiere,
    MefOption, Modalite, NumeroDossier, Parametrage, Pays, StoreError,
};

pub const UAI: &str = "0123456A";
pub const FORMATION_MPSI: CodeFormation = CodeFormation(1234);

#[derive(Default)]
pub struct MemoireDossiers {
    dossiers: Mutex<HashMap<NumeroDossier, Dossier>>,
}

impl DossierStore for MemoireDossiers {
    fn charger(&self, dossier: NumeroDossier) -> Result<Option<Dossier>, StoreError> {
        Ok(self
            .dossiers
            .lock()
            .expect("mutex des dossiers")
            .get(&dossier)
            .cloned())
    }

    fn sauvegarder(&self, dossier: Dossier) -> Result<(), StoreError> {
        self.dossiers
            .lock()
            .expect("mutex des dossiers")
            .insert(dossier.candidat.dossier, dossier);
        Ok(())
    }

    fn tous(&self) -> Result<Vec<Dossier>, StoreError> {
        Ok(self
            .dossiers
            .lock()
            .expect("mutex des dossiers")
            .values()
            .cloned()
            .collect())
    }
}

pub struct ParametrageFixe {
    etablissement: Etablissement,
    formations: HashMap<CodeFormation, Formation>,
    acces: AccesParcoursup,
}

impl Parametrage for ParametrageFixe {
    fn etablissement(&self, uai: &str) -> Option<Etablissement> {
        (self.etablissement.uai == uai).then(|| self.etablissement.clone())
    }

    fn formation(&self, code: CodeFormation) -> Option<Formation> {
        self.formations.get(&code).cloned()
    }

    fn commune(&self, _code_insee: &str) -> Option<Commune> {
        None
    }

    fn pays_par_iso2(&self, code: &str) -> Option<Pays> {
        (code == "FR").then(|| Pays {
            code_iso2: "FR".to_string(),
            num_insee: "99100".to_string(),
            libelle: "France".to_string(),
        })
    }

    fn pays_par_insee(&self, code: &str) -> Option<Pays> {
        (code == "99100").then(|| Pays {
            code_iso2: "FR".to_string(),
            num_insee: "99100".to_string(),
            libelle: "France".to_string(),
        })
    }

    fn etablissement_origine(&self, _uai: &str) -> Option<String> {
        None
    }

    fn authentifier_entrant(&self, login: &str, password: &str) -> Option<String> {
        (self.acces.entrant_login == login && self.acces.entrant_password == password)
            .then(|| self.acces.etablissement.clone())
    }

    fn acces(&self, uai: &str) -> Option<AccesParcoursup> {
        (self.acces.etablissement == uai).then(|| self.acces.clone())
    }
}

#[derive(Default)]
pub struct CourrierMemoire {
    envoyes: Mutex<Vec<Courriel>>,
}

impl CourrierMemoire {
    pub fn envoyes(&self) -> Vec<Courriel> {
        self.envoyes.lock().expect("mutex du courrier").clone()
    }
}

impl MailGateway for CourrierMemoire {
    fn envoyer(&self, courriel: &Courriel) -> Result<(), CourrielError> {
        self.envoyes
            .lock()
            .expect("mutex du courrier")
            .push(courriel.clone());
        Ok(())
    }
}

pub fn parametrage() -> ParametrageFixe {
    let etablissement = Etablissement {
        uai: UAI.to_string(),
        nom: "Lycée Condorcet".to_string(),
        email: "inscriptions@condorcet.example.org".to_string(),
        email_pieces_justificatives: "pieces@condorcet.example.org".to_string(),
        email_technique: "technique@condorcet.example.org".to_string(),
        inscriptions: true,
        fiches: FicheKind::ORDRE.iter().copied().collect::<BTreeSet<_>>(),
        champs_exclus: ChampsExclus::default(),
    };

    let formation = Formation {
        code_parcoursup: FORMATION_MPSI,
        nom: "MPSI".to_string(),
        etablissement: UAI.to_string(),
        groupe_parcoursup: 1,
        code_mef: "30112012210".to_string(),
        slug: "mpsi".to_string(),
        email_pieces_justificatives: String::new(),
        options: vec![MefOption {
            matiere: MefMatiere {
                code: "LV2-ALL".to_string(),
                libelle: "Allemand LV2".to_string(),
            },
            modalite: Modalite::Obligatoire,
            rang: 1,
            inscriptions: true,
        }],
        pieces_attendues: Vec::new(),
    };

    let mut formations = HashMap::new();
    formations.insert(FORMATION_MPSI, formation);

    ParametrageFixe {
        etablissement,
        formations,
        acces: AccesParcoursup {
            etablissement: UAI.to_string(),
            entrant_login: "psup-entrant".to_string(),
            entrant_password: "entrant-secret".to_string(),
            sortant_login: "psup-sortant".to_string(),
            sortant_password: "sortant-secret".to_string(),
        },
    }
}

pub type ServiceDeTest = ImportService<MemoireDossiers, ParametrageFixe, CourrierMemoire>;

pub fn service() -> (Arc<ServiceDeTest>, Arc<MemoireDossiers>, Arc<CourrierMemoire>) {
    let store = Arc::new(MemoireDossiers::default());
    let courrier = Arc::new(CourrierMemoire::default());
    let service = Arc::new(ImportService::new(
        store.clone(),
        Arc::new(parametrage()),
        courrier.clone(),
    ));
    (service, store, courrier)
}

/// Admission message as Parcoursup pushes it, credentials included.
pub fn message_pousse(code_candidat: u32, code_situation: &str) -> Value {
    json!({
        "identifiant": { "login": "psup-entrant", "pwd": "entrant-secret" },
        "codeCandidat": code_candidat.to_string(),
        "nom": "Durand",
        "prenom": "Camille",
        "mail": format!("candidat-{code_candidat}@example.org"),
        "sexe": "F",
        "dateNaissance": "12/07/2003",
        "adresse1": "12 rue des Lilas",
        "codePostal": "75011",
        "libelleCommune": "Paris",
        "telmobile": "0612345678",
        "codeFormationPsup": FORMATION_MPSI.0,
        "codeEtablissementAffectation": UAI,
        "codeSituation": code_situation,
        "cesure": "0",
        "internat": "0",
        "dateReponse": "02/06/2024 14:35",
    })
}
