//! Normalization of raw Parcoursup admission records.
//!
//! Pure functions, no I/O: a record coming from the live push, from a
//! pull-list response, or from a CSV export row ends up as the same
//! [`AdmissionParcoursup`] tuple. The vendor's JSON keys are documented in
//! one case and observed in another, so every lookup here goes through a
//! case-insensitive view of the object.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflows::inscription::domain::{CodeFormation, Genre, MentionBac};

/// Case-insensitive view over a JSON object, plus the `donneesCandidat`
/// envelope some campaigns wrapped the payload in.
#[derive(Debug, Clone)]
pub struct DonneesBrutes(Map<String, Value>);

impl DonneesBrutes {
    pub fn nouvelles(valeur: &Value) -> Result<Self, PayloadError> {
        let objet = valeur.as_object().ok_or(PayloadError::PasUnObjet)?;
        Ok(Self(objet.clone()))
    }

    /// The 2019 campaign wrapped the candidate facts in `donneesCandidat`;
    /// credentials stay at the outer level, so only the record parser
    /// descends into the envelope.
    fn deballer(self) -> Self {
        match self.valeur("donneesCandidat").and_then(Value::as_object) {
            Some(interieur) => Self(interieur.clone()),
            None => self,
        }
    }

    pub fn valeur(&self, cle: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(nom, _)| nom.eq_ignore_ascii_case(cle))
            .map(|(_, valeur)| valeur)
    }

    /// String form of a field; numbers are accepted and rendered, because
    /// the API is not consistent about quoting.
    pub fn texte(&self, cle: &str) -> Option<String> {
        match self.valeur(cle)? {
            Value::String(texte) => Some(texte.clone()),
            Value::Number(nombre) => Some(nombre.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn texte_non_vide(&self, cle: &str) -> Option<String> {
        self.texte(cle).filter(|texte| !texte.trim().is_empty())
    }

    fn requis(&self, cle: &str) -> Result<String, PayloadError> {
        self.texte_non_vide(cle)
            .ok_or_else(|| PayloadError::ChampManquant {
                champ: cle.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PayloadError {
    #[error("le message Parcoursup n'est pas un objet JSON")]
    PasUnObjet,
    #[error("champ « {champ} » absent du message Parcoursup")]
    ChampManquant { champ: String },
    #[error("date invalide: « {valeur} »")]
    DateInvalide { valeur: String },
    #[error("numéro de dossier invalide: « {valeur} »")]
    DossierInvalide { valeur: String },
    #[error("code formation invalide: « {valeur} »")]
    FormationInvalide { valeur: String },
}

/// Situation of the proposition as encoded by Parcoursup (`codeSituation`).
/// Kept separate from the internal wish state on purpose: the numeric
/// values overlap by accident, not by contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSituation {
    EnAttente,
    AccepteeDefinitivement,
    AccepteeAutresVoeux,
    Refusee,
}

impl CodeSituation {
    /// Lenient decoding: an unknown code reads as "en attente" rather than
    /// failing the record; the vendor has renumbered before.
    pub fn depuis_code(code: &str) -> Self {
        match code.trim() {
            "1" => Self::AccepteeDefinitivement,
            "2" => Self::AccepteeAutresVoeux,
            "3" => Self::Refusee,
            _ => Self::EnAttente,
        }
    }
}

/// Candidate facts of a normalized admission record. Enrichment fields
/// (codes of communes, countries, origin school) are optional throughout:
/// reconciliation proceeds with whatever was decodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatParcoursup {
    pub code: u32,
    pub ine: Option<String>,
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub sexe: Genre,
    pub date_naissance: Option<NaiveDate>,
    pub adresse: String,
    pub telephone_fixe: String,
    pub telephone_mobile: String,
    pub commune_naissance: Option<String>,
    pub pays_naissance: Option<String>,
    pub nationalite: Option<String>,
    pub etablissement_origine_uai: Option<String>,
    pub etablissement_origine_nom: Option<String>,
    pub bac_date: Option<NaiveDate>,
    pub bac_serie: Option<String>,
    pub bac_mention: Option<MentionBac>,
    pub code_commune: Option<String>,
    pub code_postal: Option<String>,
    pub code_pays: Option<String>,
}

/// Proposition facts of a normalized admission record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionParcoursup {
    pub code_formation: CodeFormation,
    pub code_etablissement: String,
    pub cesure: bool,
    pub internat: bool,
    pub etat: CodeSituation,
    /// Decision timestamp, civil time Europe/Paris.
    pub date: NaiveDateTime,
}

/// Guardian facts; at most two per record, and the second one is usually
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsableParcoursup {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub telephone: String,
}

/// The normalized admission tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionParcoursup {
    pub candidat: CandidatParcoursup,
    pub proposition: PropositionParcoursup,
    pub responsables: Vec<ResponsableParcoursup>,
}

/// Decode one raw admission record (push body or one entry of the
/// `getCandidatsAdmis` response).
pub fn parse_admission(valeur: &Value) -> Result<AdmissionParcoursup, PayloadError> {
    let donnees = DonneesBrutes::nouvelles(valeur)?.deballer();
    Ok(AdmissionParcoursup {
        candidat: parse_candidat(&donnees)?,
        proposition: parse_proposition(&donnees)?,
        responsables: parse_responsables(&donnees),
    })
}

fn parse_candidat(donnees: &DonneesBrutes) -> Result<CandidatParcoursup, PayloadError> {
    let code_brut = donnees.requis("codeCandidat")?;
    let code = code_brut
        .trim()
        .parse::<u32>()
        .map_err(|_| PayloadError::DossierInvalide { valeur: code_brut })?;

    let date_naissance = donnees.requis("dateNaissance")?;
    let date_naissance = parse_date_francaise(&date_naissance)
        .ok_or(PayloadError::DateInvalide {
            valeur: date_naissance,
        })
        .map(Some)?;

    // `anneeBac`/`moisBac`/... only appear once results are published.
    let bac_date = match (donnees.texte_non_vide("anneeBac"), donnees.texte_non_vide("moisBac")) {
        (Some(annee), Some(mois)) => match (annee.parse::<i32>(), mois.parse::<u32>()) {
            (Ok(annee), Ok(mois)) => NaiveDate::from_ymd_opt(annee, mois, 1),
            _ => None,
        },
        _ => None,
    };
    let bac_mention = donnees
        .texte_non_vide("mentionBac")
        .and_then(|code| code.trim().parse::<u8>().ok())
        .and_then(MentionBac::from_code);

    Ok(CandidatParcoursup {
        code,
        ine: donnees.texte_non_vide("ine"),
        nom: donnees.requis("nom")?,
        prenom: donnees.requis("prenom")?,
        email: donnees.requis("mail")?,
        sexe: match donnees.texte("sexe").as_deref() {
            Some("M") => Genre::Homme,
            _ => Genre::Femme,
        },
        date_naissance,
        adresse: formate_adresse(donnees),
        telephone_fixe: donnees.texte_non_vide("telfixe").unwrap_or_default(),
        telephone_mobile: donnees.texte_non_vide("telmobile").unwrap_or_default(),
        commune_naissance: donnees.texte_non_vide("codeCommuneNaissance"),
        pays_naissance: donnees.texte_non_vide("codePaysNaissance"),
        nationalite: donnees.texte_non_vide("codePaysNationalite"),
        etablissement_origine_uai: donnees.texte_non_vide("codeEtablissementSco"),
        etablissement_origine_nom: donnees.texte_non_vide("libelleEtablissementSco"),
        bac_date,
        bac_serie: donnees.texte_non_vide("serieBac"),
        bac_mention,
        code_commune: donnees.texte_non_vide("codeCommune"),
        code_postal: donnees.texte_non_vide("codePostal"),
        code_pays: donnees.texte_non_vide("codePaysAdresse"),
    })
}

fn parse_proposition(donnees: &DonneesBrutes) -> Result<PropositionParcoursup, PayloadError> {
    let code_brut = donnees.requis("codeFormationPsup")?;
    let code_formation = code_brut
        .trim()
        .parse::<i32>()
        .map(CodeFormation)
        .map_err(|_| PayloadError::FormationInvalide { valeur: code_brut })?;

    let date_brute = donnees.requis("dateReponse")?;
    let date = parse_date_reponse(&date_brute)?;

    Ok(PropositionParcoursup {
        code_formation,
        code_etablissement: donnees.requis("codeEtablissementAffectation")?,
        cesure: donnees.texte("cesure").as_deref() == Some("1"),
        internat: donnees.texte("internat").as_deref() == Some("1"),
        etat: CodeSituation::depuis_code(&donnees.requis("codeSituation")?),
        date,
    })
}

/// Guardian facts for ranks 1 and 2. A rank whose required subfields are
/// missing is simply skipped; the second guardian being absent is the
/// common case, not a fault.
fn parse_responsables(donnees: &DonneesBrutes) -> Vec<ResponsableParcoursup> {
    let mut responsables = Vec::new();
    for rang in 1..=2 {
        let nom = donnees.texte_non_vide(&format!("nomRL{rang}"));
        let prenom = donnees.texte_non_vide(&format!("prenomRL{rang}"));
        let email = donnees.texte_non_vide(&format!("mailRL{rang}"));
        let telephone = donnees.texte_non_vide(&format!("telRL{rang}"));
        if let (Some(nom), Some(prenom), Some(email)) = (nom, prenom, email) {
            responsables.push(ResponsableParcoursup {
                nom,
                prenom,
                email,
                telephone: telephone.unwrap_or_default(),
            });
        }
    }
    responsables
}

/// Postal address block from the scattered vendor fields. The postal-code
/// key exists in two spellings; both are tried so a silent vendor fix does
/// not break us.
pub fn formate_adresse(donnees: &DonneesBrutes) -> String {
    let code_postal = donnees
        .texte_non_vide("codepostal")
        .or_else(|| donnees.texte_non_vide("codepostale"))
        .unwrap_or_default();
    let lignes = [
        donnees.texte_non_vide("adresse1").unwrap_or_default(),
        donnees.texte_non_vide("adresse2").unwrap_or_default(),
        donnees.texte_non_vide("adresse3").unwrap_or_default(),
        format!(
            "{} {}",
            code_postal,
            donnees.texte_non_vide("libellecommune").unwrap_or_default()
        )
        .trim()
        .to_string(),
        donnees
            .texte_non_vide("libellePaysadresse")
            .unwrap_or_default(),
    ];
    lignes
        .iter()
        .filter(|ligne| !ligne.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// `dd/mm/yyyy` dates (birth dates, CSV date columns).
pub fn parse_date_francaise(valeur: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(valeur.trim(), "%d/%m/%Y").ok()
}

/// Decision timestamps: the single documented format `dd/mm/yyyy HH:MM`,
/// Europe/Paris civil time. Anything else is a parse failure for the
/// record, never silently defaulted.
pub fn parse_date_reponse(valeur: &str) -> Result<NaiveDateTime, PayloadError> {
    NaiveDateTime::parse_from_str(valeur.trim(), "%d/%m/%Y %H:%M").map_err(|_| {
        PayloadError::DateInvalide {
            valeur: valeur.to_string(),
        }
    })
}
