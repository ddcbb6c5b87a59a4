//! Client for the Parcoursup REST API.
//!
//! Every remote method is a single JSON-over-POST call carrying the
//! etablissement's credentials in the body. One call here is one call on
//! the wire: no retry loop, no queue. Retrying is the caller's decision.

use serde_json::{json, Value};

use crate::workflows::inscription::domain::{Candidat, CodeFormation, NumeroDossier};

use super::payload::{parse_admission, AdmissionParcoursup, PayloadError};

/// Minimal HTTP seam so the client can be driven against a stub in tests.
pub trait HttpGateway: Send + Sync {
    async fn post_json(&self, url: &str, corps: &Value) -> Result<ReponseHttp, ErreurTransport>;
}

#[derive(Debug, Clone)]
pub struct ReponseHttp {
    pub statut: u16,
    pub corps: Value,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ErreurTransport(pub String);

/// Production gateway backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct PasserelleReqwest {
    http: reqwest::Client,
}

impl HttpGateway for PasserelleReqwest {
    async fn post_json(&self, url: &str, corps: &Value) -> Result<ReponseHttp, ErreurTransport> {
        let reponse = self
            .http
            .post(url)
            .json(corps)
            .send()
            .await
            .map_err(|erreur| ErreurTransport(erreur.to_string()))?;
        let statut = reponse.status().as_u16();
        let corps = reponse
            .json::<Value>()
            .await
            .map_err(|erreur| ErreurTransport(erreur.to_string()))?;
        Ok(ReponseHttp { statut, corps })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("erreur de transport vers Parcoursup: {0}")]
    Transport(ErreurTransport),
    #[error("échec signalé par Parcoursup: {message}")]
    Service { message: String },
    #[error("réponse Parcoursup inattendue: {0}")]
    Reponse(String),
}

impl ClientError {
    /// Short category shown to a staff member on interactive lookups;
    /// internals go to the logs, not to the screen.
    pub const fn categorie(&self) -> &'static str {
        match self {
            Self::Transport(_) => "erreur transport",
            Self::Service { .. } => "erreur Parcoursup",
            Self::Reponse(_) => "erreur inconnue",
        }
    }
}

/// Administrative-enrollment statuses accepted by
/// `majInscriptionAdministrative`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtatInscription {
    Principale,
    DoubleCursus,
    Annulee,
    Parallele,
    ParalleleSecondaire,
}

impl EtatInscription {
    pub const fn code(self) -> i32 {
        match self {
            Self::Principale => 1,
            Self::DoubleCursus => 2,
            Self::Annulee => 3,
            Self::Parallele => 4,
            Self::ParalleleSecondaire => 5,
        }
    }
}

/// Optional filters of `getCandidatsAdmis`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiltreAdmis {
    pub code_candidat: Option<NumeroDossier>,
    pub formation: Option<CodeFormation>,
}

pub struct ParcoursupClient<G> {
    gateway: G,
    endpoint: String,
    login: String,
    password: String,
    code_etablissement: String,
}

impl<G: HttpGateway> ParcoursupClient<G> {
    pub fn new(
        gateway: G,
        endpoint: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
        code_etablissement: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            endpoint: endpoint.into(),
            login: login.into(),
            password: password.into(),
            code_etablissement: code_etablissement.into(),
        }
    }

    /// Send one remote method call. Credentials are merged into the body;
    /// that is how the API authenticates, there is no header scheme.
    pub async fn send(&self, methode: &str, mut donnees: Value) -> Result<Value, ClientError> {
        donnees["identifiant"] = json!({
            "login": self.login,
            "pwd": self.password,
        });

        let url = format!("{}{}", self.endpoint, methode);
        let reponse = self
            .gateway
            .post_json(&url, &donnees)
            .await
            .map_err(ClientError::Transport)?;

        if !(200..300).contains(&reponse.statut) {
            return Err(ClientError::Transport(ErreurTransport(format!(
                "HTTP {} sur {}",
                reponse.statut, methode
            ))));
        }

        // A failure can also come back inside a 200: an object whose
        // `retour` reads NOK, with the vendor message attached.
        if let Some(objet) = reponse.corps.as_object() {
            if objet.get("retour").and_then(Value::as_str) == Some("NOK") {
                let message = objet
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Erreur Parcoursup inconnue")
                    .to_string();
                return Err(ClientError::Service { message });
            }
        }

        Ok(reponse.corps)
    }

    /// `getCandidatsAdmis`: list admitted candidates, each raw entry pushed
    /// through the payload parser. Rows that fail to parse come back as
    /// per-record errors so a sync loop can skip-and-log them.
    pub async fn candidats_admis(
        &self,
        filtre: FiltreAdmis,
    ) -> Result<Vec<Result<AdmissionParcoursup, PayloadError>>, ClientError> {
        let mut donnees = json!({
            "codeEtablissement": self.code_etablissement,
        });
        if let Some(code) = filtre.code_candidat {
            donnees["codeCandidat"] = json!(code.0);
        }
        if let Some(formation) = filtre.formation {
            donnees["codeFormationpsup"] = json!(formation.0);
        }

        let corps = self.send("getCandidatsAdmis", donnees).await?;
        let entrees = corps.as_array().ok_or_else(|| {
            ClientError::Reponse("getCandidatsAdmis n'a pas renvoyé une liste".to_string())
        })?;

        Ok(entrees.iter().map(parse_admission).collect())
    }

    /// Single-candidate lookup by admission-file number.
    pub async fn candidat(
        &self,
        code: NumeroDossier,
    ) -> Result<AdmissionParcoursup, ClientError> {
        let admissions = self
            .candidats_admis(FiltreAdmis {
                code_candidat: Some(code),
                formation: None,
            })
            .await?;
        match admissions.into_iter().next() {
            Some(Ok(admission)) => Ok(admission),
            Some(Err(erreur)) => Err(ClientError::Reponse(erreur.to_string())),
            None => Err(ClientError::Reponse(format!(
                "candidat {code} inconnu de Parcoursup"
            ))),
        }
    }

    /// `majInscriptionAdministrative`: push the administrative-enrollment
    /// status of a candidate back to Parcoursup.
    pub async fn maj_inscription(
        &self,
        candidat: &Candidat,
        formation: CodeFormation,
        etat: EtatInscription,
    ) -> Result<(), ClientError> {
        let donnees = json!({
            "codeCandidat": candidat.dossier.0,
            "ine": candidat.ine.clone().unwrap_or_default(),
            "nom": candidat.nom,
            "prenom": candidat.prenom,
            "dateNaissance": candidat
                .date_naissance
                .map(|date| date.format("%d/%m/%Y").to_string())
                .unwrap_or_default(),
            "codeFormationPsup": formation.0,
            "codeFormation1": formation.0.to_string(),
            "codeSISE": formation.0,
            "etatInscription": etat.code(),
            "codeEtablissementAffectation": self.code_etablissement,
        });
        self.send("majInscriptionAdministrative", donnees).await?;
        Ok(())
    }

    /// The canned test call Parcoursup requires before it opens the
    /// production API to an etablissement.
    pub async fn requete_test(&self) -> Result<(), ClientError> {
        let donnees = json!({
            "codeCandidat": 1,
            "ine": "0123456789AB",
            "nom": "Bernard",
            "prenom": "Minet",
            "dateNaissance": "14/07/1789",
            "codeFormationPsup": 42,
            "codeFormation1": "42",
            "codeSISE": 42,
            "etatInscription": EtatInscription::Principale.code(),
            "codeEtablissementAffectation": self.code_etablissement,
        });
        self.send("majInscriptionAdministrative", donnees).await?;
        Ok(())
    }
}
