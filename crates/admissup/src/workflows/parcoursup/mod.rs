//! Everything that faces the Parcoursup service: payload normalization,
//! CSV export reading, code mapping, and the REST client.

pub mod client;
pub mod export;
pub mod mapping;
pub mod payload;

pub use client::{
    ClientError, ErreurTransport, EtatInscription, FiltreAdmis, HttpGateway, ParcoursupClient,
    PasserelleReqwest, ReponseHttp,
};
pub use export::{parse_export, ExportError};
pub use payload::{
    parse_admission, AdmissionParcoursup, CandidatParcoursup, CodeSituation, PayloadError,
    PropositionParcoursup, ResponsableParcoursup,
};

use crate::workflows::inscription::import::{BilanImport, ImportService};
use crate::workflows::inscription::repository::{DossierStore, MailGateway, Parametrage};

/// Pull-model synchronization: fetch the admitted list and feed it to the
/// import engine. A record that fails, unreadable or rejected, is logged
/// and skipped; one bad record never blocks the others.
pub async fn synchroniser<G, S, P, M>(
    client: &ParcoursupClient<G>,
    service: &ImportService<S, P, M>,
    filtre: FiltreAdmis,
) -> Result<BilanImport, ClientError>
where
    G: HttpGateway,
    S: DossierStore + 'static,
    P: Parametrage + 'static,
    M: MailGateway + 'static,
{
    let admissions = client.candidats_admis(filtre).await?;
    Ok(service.importer_lot(admissions))
}
