//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use monetary_correction::dates::add_months;
use monetary_correction::{CorrectionIndex, IndexPoint, IndexSeries, StaticSource};
use std::sync::Arc;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// One point per month starting at `start`
pub fn monthly(start: NaiveDate, values: &[f64]) -> IndexSeries {
    IndexSeries::new(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| IndexPoint::new(add_months(start, i as u32), v))
            .collect(),
    )
}

/// Five years of plausible monthly data for every index, from 01/2019
pub fn market_source() -> Arc<StaticSource> {
    let start = d(2019, 1, 1);
    let months = 60;
    let series = |base: f64, step: f64| {
        let values: Vec<f64> = (0..months).map(|i| base + (i % 7) as f64 * step).collect();
        monthly(start, &values)
    };

    Arc::new(
        StaticSource::new()
            .with_series(CorrectionIndex::Ipca, series(0.25, 0.08))
            .with_series(CorrectionIndex::Inpc, series(0.22, 0.07))
            .with_series(CorrectionIndex::IgpM, series(0.10, 0.20))
            .with_series(CorrectionIndex::Selic, series(0.45, 0.05))
            .with_series(CorrectionIndex::Tr, series(0.00, 0.01)),
    )
}

/// Extraction record for a case with a split and a unified claimant
pub const CASE_JSON: &str = r#"{
    "autores": [
        {
            "nome": "Maria Souza",
            "cpf": "123.456.789-00",
            "danoMaterial": {"valor": 5000, "indiceCorrecao": "IPCA", "tipoJuros": "1_PORCENTO"},
            "danoMoral": {"valor": 3000, "tipoJuros": "SELIC"},
            "valorPrincipal": 8000
        },
        {"nome": "João Lima", "valorPrincipal": "1.200,00"},
        {"nome": "Sem Valor", "valorPrincipal": 0}
    ],
    "dataAjuizamento": "10/03/2019",
    "dataSentenca": "02/08/2021",
    "dataCitacao": "20/05/2019",
    "indiceCorrecao": "INPC",
    "tipoJuros": "SELIC_MENOS_IPCA",
    "tribunal": "TJSP",
    "numeroProcesso": "1000000-00.2019.8.26.0100",
    "vara": "1ª Vara Cível"
}"#;
