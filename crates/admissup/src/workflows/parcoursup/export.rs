//! Reader for the admitted-candidates CSV exports.
//!
//! Parcoursup produces two export flavors, "standard" and "configurable",
//! which disagree on column titles (`Numéro candidat` vs `Numéro`, `e-mail
//! du candidat` vs `Adresse mail`, ...). Neither carries the formation nor
//! the etablissement in an exploitable form, so both are supplied by the
//! caller; guardians are never present in exports.

use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDateTime;

use crate::workflows::inscription::domain::{CodeFormation, Genre, MentionBac};

use super::payload::{
    parse_date_francaise, parse_date_reponse, AdmissionParcoursup, CandidatParcoursup,
    CodeSituation, PayloadError, PropositionParcoursup, ResponsableParcoursup,
};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export Parcoursup illisible: {0}")]
    Csv(#[from] csv::Error),
}

/// One parsed export row, keyed by header title.
struct LigneExport {
    champs: HashMap<String, String>,
}

impl LigneExport {
    /// First non-empty value among the column titles the two export
    /// flavors use for the same datum.
    fn un_de(&self, titres: &[&str]) -> Option<String> {
        titres
            .iter()
            .filter_map(|titre| self.champs.get(*titre))
            .map(|valeur| valeur.trim())
            .find(|valeur| !valeur.is_empty())
            .map(str::to_string)
    }

    fn requis(&self, titres: &[&str]) -> Result<String, PayloadError> {
        self.un_de(titres).ok_or_else(|| PayloadError::ChampManquant {
            champ: titres[0].to_string(),
        })
    }
}

/// Parse an export stream into normalized admission tuples, one `Result`
/// per row so a bulk import can skip-and-log bad rows without losing the
/// rest of the file.
pub fn parse_export<R: Read>(
    lecteur: R,
    code_etablissement: &str,
    code_formation: CodeFormation,
) -> Result<Vec<Result<AdmissionParcoursup, PayloadError>>, ExportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(lecteur);

    let titres: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect();

    let mut admissions = Vec::new();
    for enregistrement in csv_reader.records() {
        let enregistrement = enregistrement?;
        let champs = titres
            .iter()
            .cloned()
            .zip(enregistrement.iter().map(str::to_string))
            .collect();
        admissions.push(parse_ligne(
            &LigneExport { champs },
            code_etablissement,
            code_formation,
        ));
    }
    Ok(admissions)
}

fn parse_ligne(
    ligne: &LigneExport,
    code_etablissement: &str,
    code_formation: CodeFormation,
) -> Result<AdmissionParcoursup, PayloadError> {
    let code_brut = ligne.requis(&["Numéro candidat", "Numéro"])?;
    let code = code_brut
        .parse::<u32>()
        .map_err(|_| PayloadError::DossierInvalide { valeur: code_brut })?;

    let date_naissance = ligne.requis(&["Date de Naissance", "Date de naissance"])?;
    let date_naissance = parse_date_francaise(&date_naissance)
        .ok_or(PayloadError::DateInvalide {
            valeur: date_naissance,
        })
        .map(Some)?;

    let civilite = ligne.un_de(&["Etat civil", "Civilité"]);
    let adresse = formate_adresse_export(ligne);

    let candidat = CandidatParcoursup {
        code,
        ine: ligne.un_de(&["Numéro INE"]),
        nom: ligne.requis(&["Nom"])?,
        prenom: ligne.requis(&["Prénom"])?,
        email: ligne.requis(&["e-mail du candidat", "Adresse mail"])?,
        sexe: match civilite.as_deref() {
            Some("M.") => Genre::Homme,
            _ => Genre::Femme,
        },
        date_naissance,
        adresse,
        telephone_fixe: ligne
            .un_de(&["Téléphone fixe", "Téléphone"])
            .unwrap_or_default(),
        telephone_mobile: ligne.un_de(&["Téléphone mobile"]).unwrap_or_default(),
        commune_naissance: None,
        pays_naissance: None,
        // The export spells nationality as a label; only the unambiguous
        // French case is kept.
        nationalite: ligne
            .un_de(&["Nationalité"])
            .filter(|valeur| valeur == "FR"),
        etablissement_origine_uai: None,
        etablissement_origine_nom: ligne.un_de(&["Etablissement d'origine"]),
        bac_date: None,
        bac_serie: ligne.un_de(&["Série diplôme"]),
        bac_mention: ligne
            .un_de(&["Mention diplôme"])
            .and_then(|code| code.parse::<u8>().ok())
            .and_then(MentionBac::from_code),
        code_commune: None,
        code_postal: ligne.un_de(&["Code postal"]),
        code_pays: None,
    };

    let cesure = ligne
        .un_de(&["Année de césure"])
        .map(|valeur| valeur.to_lowercase() == "oui")
        .unwrap_or(false);
    let internat = ligne
        .un_de(&["Internat"])
        .map(|valeur| valeur.to_lowercase() == "oui")
        .unwrap_or(false)
        || ligne
            .un_de(&["Internat obtenu"])
            .map(|valeur| valeur.to_lowercase() == "avec internat")
            .unwrap_or(false);

    let date = ligne.requis(&["date réponse", "Date réponse"])?;
    let date = parse_date_reponse_export(&date)?;

    let proposition = PropositionParcoursup {
        code_formation,
        code_etablissement: code_etablissement.to_string(),
        cesure,
        internat,
        // The export only lists admitted candidates; the column that hints
        // at the situation is textual and unreliable.
        etat: CodeSituation::AccepteeDefinitivement,
        date,
    };

    Ok(AdmissionParcoursup {
        candidat,
        proposition,
        responsables: Vec::<ResponsableParcoursup>::new(),
    })
}

/// Export date columns come with or without the time part.
fn parse_date_reponse_export(valeur: &str) -> Result<NaiveDateTime, PayloadError> {
    if let Ok(date) = parse_date_reponse(valeur) {
        return Ok(date);
    }
    parse_date_francaise(valeur)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(PayloadError::DateInvalide {
            valeur: valeur.to_string(),
        })
}

fn formate_adresse_export(ligne: &LigneExport) -> String {
    let code_postal = ligne.un_de(&["Code postal"]).unwrap_or_default();
    let commune = ligne.un_de(&["Commune"]).unwrap_or_default();
    let lignes = [
        ligne.un_de(&["Adresse 1"]).unwrap_or_default(),
        ligne.un_de(&["Adresse 2"]).unwrap_or_default(),
        ligne.un_de(&["Adresse 3"]).unwrap_or_default(),
        format!("{code_postal} {commune}").trim().to_string(),
        ligne
            .un_de(&["Pays"])
            .unwrap_or_else(|| "France".to_string()),
    ];
    lignes
        .iter()
        .filter(|ligne| !ligne.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}
