use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::workflows::inscription::domain::{CodeFormation, Dossier, NumeroDossier};
use crate::workflows::inscription::fiches::FicheKind;
use crate::workflows::inscription::import::ImportService;
use crate::workflows::inscription::parametrage::{
    AccesParcoursup, ChampsExclus, Commune, Etablissement, Formation, MefMatiere, MefOption,
    Modalite, Pays, PieceAttendue,
};
use crate::workflows::inscription::repository::{
    Courriel, CourrielError, DossierStore, MailGateway, Parametrage, StoreError,
};
use crate::workflows::parcoursup::payload::{parse_admission, AdmissionParcoursup};

pub(super) const UAI: &str = "0123456A";
pub(super) const FORMATION_MPSI: CodeFormation = CodeFormation(1234);
pub(super) const FORMATION_PCSI: CodeFormation = CodeFormation(5678);

#[derive(Default)]
pub(super) struct MemoireDossiers {
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

pub(super) struct ParametrageFixe {
    etablissements: HashMap<String, Etablissement>,
    formations: HashMap<CodeFormation, Formation>,
    communes: HashMap<String, Commune>,
    pays: Vec<Pays>,
    lycees_origine: HashMap<String, String>,
    acces: Vec<AccesParcoursup>,
}

impl Parametrage for ParametrageFixe {
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

fn option(code: &str, modalite: Modalite, rang: u8) -> MefOption {
    MefOption {
        matiere: MefMatiere {
            code: code.to_string(),
            libelle: code.to_string(),
        },
        modalite,
        rang,
        inscriptions: true,
    }
}

pub(super) fn etablissement_complet() -> Etablissement {
    Etablissement {
        uai: UAI.to_string(),
        nom: "Lycée Condorcet".to_string(),
        email: "inscriptions@condorcet.example.org".to_string(),
        email_pieces_justificatives: "pieces@condorcet.example.org".to_string(),
        email_technique: "technique@condorcet.example.org".to_string(),
        inscriptions: true,
        fiches: FicheKind::ORDRE.iter().copied().collect::<BTreeSet<_>>(),
        champs_exclus: ChampsExclus::default(),
    }
}

pub(super) fn formation_mpsi() -> Formation {
    Formation {
        code_parcoursup: FORMATION_MPSI,
        nom: "MPSI".to_string(),
        etablissement: UAI.to_string(),
        groupe_parcoursup: 1,
        code_mef: "30112012210".to_string(),
        slug: "mpsi".to_string(),
        email_pieces_justificatives: String::new(),
        options: vec![
            option("LV2-ALL", Modalite::Obligatoire, 1),
            option("LV2-ESP", Modalite::Obligatoire, 1),
            option("SI", Modalite::Obligatoire, 2),
            option("LATIN", Modalite::Facultative, 3),
        ],
        pieces_attendues: vec![PieceAttendue {
            code: "exeat".to_string(),
            libelle: "Exeat".to_string(),
            descriptif: "Certificat de radiation du lycée d'origine".to_string(),
            email_specifique: None,
        }],
    }
}

pub(super) fn formation_pcsi() -> Formation {
    Formation {
        code_parcoursup: FORMATION_PCSI,
        nom: "PCSI".to_string(),
        etablissement: UAI.to_string(),
        groupe_parcoursup: 2,
        code_mef: "30112013210".to_string(),
        slug: "pcsi".to_string(),
        email_pieces_justificatives: String::new(),
        options: vec![option("LV2-ALL", Modalite::Obligatoire, 1)],
        pieces_attendues: Vec::new(),
    }
}

pub(super) fn parametrage() -> ParametrageFixe {
    parametrage_avec(etablissement_complet())
}

pub(super) fn parametrage_avec(etablissement: Etablissement) -> ParametrageFixe {
    let mut etablissements = HashMap::new();
    etablissements.insert(etablissement.uai.clone(), etablissement);

    let mut formations = HashMap::new();
    formations.insert(FORMATION_MPSI, formation_mpsi());
    formations.insert(FORMATION_PCSI, formation_pcsi());

    let mut communes = HashMap::new();
    for (code, nom) in [("75111", "Paris 11e"), ("75112", "Paris 12e")] {
        communes.insert(
            code.to_string(),
            Commune {
                code_insee: code.to_string(),
                nom: nom.to_string(),
            },
        );
    }

    let mut lycees_origine = HashMap::new();
    lycees_origine.insert("0750699D".to_string(), "Lycée Voltaire".to_string());

    ParametrageFixe {
        etablissements,
        formations,
        communes,
        pays: vec![Pays {
            code_iso2: "FR".to_string(),
            num_insee: "99100".to_string(),
            libelle: "France".to_string(),
        }],
        lycees_origine,
        acces: vec![AccesParcoursup {
            etablissement: UAI.to_string(),
            entrant_login: "psup-entrant".to_string(),
            entrant_password: "entrant-secret".to_string(),
            sortant_login: "psup-sortant".to_string(),
            sortant_password: "sortant-secret".to_string(),
        }],
    }
}

/// Mail gateway keeping everything in memory; addresses listed in
/// `refuser` bounce, so batch tolerance can be exercised.
#[derive(Default)]
pub(super) struct CourrierMemoire {
    refus: Mutex<BTreeSet<String>>,
    envoyes: Mutex<Vec<Courriel>>,
}

impl CourrierMemoire {
    pub(super) fn envoyes(&self) -> Vec<Courriel> {
        self.envoyes.lock().expect("mutex du courrier").clone()
    }

    pub(super) fn refuser(&self, adresse: &str) {
        self.refus
            .lock()
            .expect("mutex du courrier")
            .insert(adresse.to_string());
    }

    pub(super) fn accepter(&self, adresse: &str) {
        self.refus.lock().expect("mutex du courrier").remove(adresse);
    }
}

impl MailGateway for CourrierMemoire {
    fn envoyer(&self, courriel: &Courriel) -> Result<(), CourrielError> {
        if self
            .refus
            .lock()
            .expect("mutex du courrier")
            .contains(&courriel.a)
        {
            return Err(CourrielError::Transport(format!(
                "adresse refusée: {}",
                courriel.a
            )));
        }
        self.envoyes
            .lock()
            .expect("mutex du courrier")
            .push(courriel.clone());
        Ok(())
    }
}

pub(super) type ServiceDeTest = ImportService<MemoireDossiers, ParametrageFixe, CourrierMemoire>;

pub(super) fn service() -> (
    ServiceDeTest,
    Arc<MemoireDossiers>,
    Arc<CourrierMemoire>,
) {
    service_avec(parametrage())
}

pub(super) fn service_avec(
    parametrage: ParametrageFixe,
) -> (
    ServiceDeTest,
    Arc<MemoireDossiers>,
    Arc<CourrierMemoire>,
) {
    let store = Arc::new(MemoireDossiers::default());
    let courrier = Arc::new(CourrierMemoire::default());
    let service = ImportService::new(store.clone(), Arc::new(parametrage), courrier.clone());
    (service, store, courrier)
}

/// Push-style admission message, as Parcoursup would deliver it.
pub(super) fn message_admission(
    code_candidat: u32,
    formation: CodeFormation,
    code_situation: &str,
    internat: bool,
) -> Value {
    let internat = if internat { "1" } else { "0" };
    json!({
        "codeCandidat": code_candidat.to_string(),
        "ine": format!("{code_candidat:010}A"),
        "nom": "Durand",
        "prenom": "Camille",
        "mail": format!("candidat-{code_candidat}@example.org"),
        "sexe": "F",
        "dateNaissance": "12/07/2003",
        "adresse1": "12 rue des Lilas",
        "codePostal": "75011",
        "libelleCommune": "Paris",
        "libellePaysAdresse": "France",
        "telmobile": "0612345678",
        "codeCommune": "75111",
        "codePaysAdresse": "99100",
        "codeCommuneNaissance": "75112",
        "codePaysNaissance": "99100",
        "codeEtablissementSco": "0750699D",
        "libelleEtablissementSco": "Lycée Voltaire",
        "serieBac": "Générale",
        "codeFormationPsup": formation.0,
        "codeEtablissementAffectation": UAI,
        "codeSituation": code_situation,
        "cesure": "0",
        "internat": internat,
        "dateReponse": "02/06/2024 14:35",
        "nomRL1": "Durand",
        "prenomRL1": "Michel",
        "mailRL1": "michel.durand@example.org",
        "telRL1": "0145678901",
    })
}

pub(super) fn admission(
    code_candidat: u32,
    formation: CodeFormation,
    code_situation: &str,
    internat: bool,
) -> AdmissionParcoursup {
    parse_admission(&message_admission(
        code_candidat,
        formation,
        code_situation,
        internat,
    ))
    .expect("message de test valide")
}
