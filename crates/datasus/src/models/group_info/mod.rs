use crate::errors::{DatasusError, DatasusResult};
use serde::Serialize;

/// A code of a database enumeration (group or disease) and its readable name.
///
/// # Example
/// ```rust
/// use datasus::models::group_info::{SIH_GROUPS, group_name};
///
/// assert_eq!(group_name(SIH_GROUPS, "rd"), Some("AIH Reduzida"));
/// assert_eq!(group_name(SIH_GROUPS, "XX"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupInfo {
    pub code: &'static str,
    pub name: &'static str,
}

impl GroupInfo {
    pub const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

pub type GroupTable = &'static [GroupInfo];

pub static SIH_GROUPS: GroupTable = &[
    GroupInfo::new("RD", "AIH Reduzida"),
    GroupInfo::new("RJ", "AIH Rejeitada"),
    GroupInfo::new("ER", "AIH Rejeitada com erro"),
    GroupInfo::new("SP", "Serviços Profissionais"),
    GroupInfo::new("CH", "Cadastro Hospitalar"),
    GroupInfo::new("CM", ""),
];

// Empty names are published without a description on the server
pub static SIA_GROUPS: GroupTable = &[
    GroupInfo::new("AB", "APAC de Cirurgia Bariátrica"),
    GroupInfo::new("ABO", "APAC de Acompanhamento Pós Cirurgia Bariátrica"),
    GroupInfo::new("ACF", "APAC de Confecção de Fístula"),
    GroupInfo::new("AD", "APAC de Laudos Diversos"),
    GroupInfo::new("AM", "APAC de Medicamentos"),
    GroupInfo::new("AMP", ""),
    GroupInfo::new("AN", "APAC de Nefrologia"),
    GroupInfo::new("AQ", "APAC de Quimioterapia"),
    GroupInfo::new("AR", "APAC de Radioterapia"),
    GroupInfo::new("ATD", "APAC de Tratamento Dialítico"),
    GroupInfo::new("BI", "Boletim de Produção Ambulatorial individualizado"),
    GroupInfo::new("IMPBO", ""),
    GroupInfo::new("PA", "Produção Ambulatorial"),
    GroupInfo::new("PAM", ""),
    GroupInfo::new("PAR", ""),
    GroupInfo::new("PAS", ""),
    GroupInfo::new("PS", "RAAS Psicossocial"),
    GroupInfo::new("SAD", "RAAS de Atenção Domiciliar"),
];

pub static CNES_GROUPS: GroupTable = &[
    GroupInfo::new("DC", "Dados Complementares"),
    GroupInfo::new("EE", "Estabelecimento de Ensino"),
    GroupInfo::new("EF", "Estabelecimento Filantrópico"),
    GroupInfo::new("EP", "Equipes"),
    GroupInfo::new("EQ", "Equipamentos"),
    GroupInfo::new("GM", "Gestão e Metas"),
    GroupInfo::new("HB", "Habilitação"),
    GroupInfo::new("IN", "Incentivos"),
    GroupInfo::new("LT", "Leitos"),
    GroupInfo::new("PF", "Profissional"),
    GroupInfo::new("RC", "Regra Contratual"),
    GroupInfo::new("SR", "Serviço Especializado"),
    GroupInfo::new("ST", "Estabelecimentos"),
];

pub static CIHA_GROUPS: GroupTable = &[GroupInfo::new(
    "CIHA",
    "Comunicação de Internação Hospitalar e Ambulatorial",
)];

pub static PNI_GROUPS: GroupTable = &[
    GroupInfo::new("CPNI", "Cobertura Vacinal"),
    GroupInfo::new("DPNI", "Doses Aplicadas"),
];

/// Storage prefix to the revision of the ICD the records are coded with
pub static SIM_GROUPS: GroupTable = &[GroupInfo::new("DO", "CID10"), GroupInfo::new("DOR", "CID9")];

pub static SINASC_GROUPS: GroupTable = &[
    GroupInfo::new("DN", "Declarações de Nascidos Vivos"),
    GroupInfo::new("DNR", "Dados dos Nascidos Vivos por UF de residência"),
];

pub static SINAN_DISEASES: GroupTable = &[
    GroupInfo::new("ACBI", "Acidente de trabalho com material biológico"),
    GroupInfo::new("ACGR", "Acidente de trabalho"),
    GroupInfo::new("ANIM", "Acidente por Animais Peçonhentos"),
    GroupInfo::new("ANTR", "Atendimento Antirrabico"),
    GroupInfo::new("BOTU", "Botulismo"),
    GroupInfo::new("CANC", "Cancêr relacionado ao trabalho"),
    GroupInfo::new("CHAG", "Doença de Chagas Aguda"),
    GroupInfo::new("CHIK", "Febre de Chikungunya"),
    GroupInfo::new("COLE", "Cólera"),
    GroupInfo::new("COQU", "Coqueluche"),
    GroupInfo::new("DENG", "Dengue"),
    GroupInfo::new("DERM", "Dermatoses ocupacionais"),
    GroupInfo::new("DIFT", "Difteria"),
    GroupInfo::new("ESQU", "Esquistossomose"),
    GroupInfo::new("EXAN", "Doença exantemáticas"),
    GroupInfo::new("FMAC", "Febre Maculosa"),
    GroupInfo::new("FTIF", "Febre Tifóide"),
    GroupInfo::new("HANS", "Hanseníase"),
    GroupInfo::new("HANT", "Hantavirose"),
    GroupInfo::new("HEPA", "Hepatites Virais"),
    GroupInfo::new("IEXO", "Intoxicação Exógena"),
    GroupInfo::new("INFL", "Influenza Pandêmica"),
    GroupInfo::new("LEIV", "Leishmaniose Visceral"),
    GroupInfo::new("LEPT", "Leptospirose"),
    GroupInfo::new("LERD", "LER/Dort"),
    GroupInfo::new("LTAN", "Leishmaniose Tegumentar Americana"),
    GroupInfo::new("MALA", "Malária"),
    GroupInfo::new("MENI", "Meningite"),
    GroupInfo::new("MENT", "Transtornos mentais relacionados ao trabalho"),
    GroupInfo::new("NTRA", "Notificação de Tracoma"),
    GroupInfo::new("PAIR", "Perda auditiva por ruído relacionado ao trabalho"),
    GroupInfo::new("PEST", "Peste"),
    GroupInfo::new("PFAN", "Paralisia Flácida Aguda"),
    GroupInfo::new("PNEU", "Pneumoconioses realacionadas ao trabalho"),
    GroupInfo::new("RAIV", "Raiva"),
    GroupInfo::new("SDTA", "Surto Doenças Transmitidas por Alimentos"),
    GroupInfo::new("SIFA", "Sífilis Adquirida"),
    GroupInfo::new("SIFC", "Sífilis Congênita"),
    GroupInfo::new("SIFG", "Sífilis em Gestante"),
    GroupInfo::new("SRC", "Síndrome da Rubéola Congênia"),
    GroupInfo::new("TETA", "Tétano Acidental"),
    GroupInfo::new("TETN", "Tétano Neonatal"),
    GroupInfo::new("TOXC", "Toxoplasmose Congênita"),
    GroupInfo::new("TOXG", "Toxoplasmose Gestacional"),
    GroupInfo::new("TRAC", "Inquérito de Tracoma"),
    GroupInfo::new("TUBE", "Tuberculose"),
    GroupInfo::new("VARC", "Varicela"),
    GroupInfo::new("VIOL", "Violência doméstica, sexual e/ou outras violências"),
    GroupInfo::new("ZIKA", "Zika Vírus"),
];

/// Entry for `code` (case insensitive)
pub fn find_group(table: GroupTable, code: &str) -> Option<&'static GroupInfo> {
    table.iter().find(|group| group.code.eq_ignore_ascii_case(code))
}

pub fn group_name(table: GroupTable, code: &str) -> Option<&'static str> {
    find_group(table, code).map(|group| group.name)
}

/// Entry whose readable name is `name` (case insensitive)
pub fn find_by_name(table: GroupTable, name: &str) -> Option<&'static GroupInfo> {
    table.iter().find(|group| group.name.eq_ignore_ascii_case(name))
}

/// Uppercases `codes` and checks each against `table`, reporting every
/// unknown value under `field`
pub fn validate_codes<S: AsRef<str>>(
    field: &'static str,
    table: GroupTable,
    codes: &[S],
) -> DatasusResult<Vec<String>> {
    let upper: Vec<String> = codes.iter().map(|c| c.as_ref().trim().to_uppercase()).collect();
    let unknown: Vec<&String> = upper
        .iter()
        .filter(|code| find_group(table, code).is_none())
        .collect();
    if !unknown.is_empty() {
        return Err(DatasusError::validation(field, unknown.into_iter().cloned()));
    }
    Ok(upper)
}
