use serde::Serialize;

/// Descriptive metadata of a DATASUS database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseMetadata {
    pub long_name: &'static str,
    pub source: &'static [&'static str],
    pub description: &'static str,
}

pub static SIA: DatabaseMetadata = DatabaseMetadata {
    long_name: "Sistema de Informações Ambulatoriais",
    source: &["http://sia.datasus.gov.br/principal/index.php"],
    description: concat!(
        "O Sistema de Informação Ambulatorial (SIA) foi instituído pela ",
        "Portaria GM/MS n.º 896 de 29 de junho de 1990. Originalmente, o ",
        "SIA foi concebido a partir do projeto SICAPS (Sistema de ",
        "Informação e Controle Ambulatorial da Previdência Social), em ",
        "que os conceitos, os objetivos e as diretrizes criados para o ",
        "desenvolvimento do SICAPS foram extremamente importantes e ",
        "amplamente utilizados para o desenvolvimento do SIA, tais",
        " como: (i) o acompanhamento das programações físicas e ",
        "orçamentárias; (ii) o acompanhamento das ações de saúde ",
        "produzidas; (iii) a agilização do pagamento e controle ",
        "orçamentário e financeiro; e (iv) a formação de banco de dados ",
        "para contribuir com a construção do SUS."
    ),
};

pub static SIH: DatabaseMetadata = DatabaseMetadata {
    long_name: "Sistema de Informações Hospitalares",
    source: &[
        "https://datasus.saude.gov.br/acesso-a-informacao/morbidade-hospitalar-do-sus-sih-sus/",
        "https://datasus.saude.gov.br/acesso-a-informacao/producao-hospitalar-sih-sus/",
    ],
    description: concat!(
        "A finalidade do AIH (Sistema SIHSUS) é a de transcrever todos os ",
        "atendimentos que provenientes de internações hospitalares que ",
        "foram financiadas pelo SUS, e após o processamento, gerarem ",
        "relatórios para os gestores que lhes possibilitem fazer os ",
        "pagamentos dos estabelecimentos de saúde. Além disso, o nível ",
        "Federal recebe mensalmente uma base de dados de todas as ",
        "internações autorizadas (aprovadas ou não para pagamento) para ",
        "que possam ser repassados às Secretarias de Saúde os valores de ",
        "Produção de Média e Alta complexidade além dos valores de CNRAC, ",
        "FAEC e de Hospitais Universitários, em suas variadas formas de ",
        "contrato de gestão."
    ),
};

pub static CIHA: DatabaseMetadata = DatabaseMetadata {
    long_name: "Comunicação de Internação Hospitalar e Ambulatorial",
    source: &["http://ciha.datasus.gov.br/CIHA/index.php"],
    description: concat!(
        "A CIHA foi criada para ampliar o processo de planejamento, ",
        "programação, controle, avaliação e regulação da assistência à ",
        "saúde permitindo um conhecimento mais abrangente e profundo dos ",
        "perfis nosológico e epidemiológico da população brasileira, da ",
        "capacidade instalada e do potencial de produção de serviços do ",
        "conjunto de estabelecimentos de saúde do País. As informações ",
        "registradas na CIHA servem como base para o processo de ",
        "Certificação de Entidades Beneficentes de Assistência Social em ",
        "Saúde (CEBAS) e para monitoramento dos programas PRONAS e PRONON."
    ),
};

pub static CNES: DatabaseMetadata = DatabaseMetadata {
    long_name: "Cadastro Nacional de Estabelecimentos de Saúde",
    source: &["https://cnes.datasus.gov.br/"],
    description: concat!(
        "O Cadastro Nacional de Estabelecimentos de Saúde (CNES) é o ",
        "sistema de informação oficial de cadastramento de informações ",
        "de todos os estabelecimentos de saúde no país, independentemente ",
        "de sua natureza jurídica ou de integrarem o Sistema Único de ",
        "Saúde (SUS)."
    ),
};

pub static IBGE_DATASUS: DatabaseMetadata = DatabaseMetadata {
    long_name: "Populaçao Residente, Censos, Contagens Populacionais e Projeçoes Intercensitarias",
    source: &["ftp://ftp.datasus.gov.br/dissemin/publicos/IBGE"],
    description: concat!(
        "São aqui apresentados informações sobre a população residente, ",
        "estratificadas por município, faixas etárias e sexo, obtidas a ",
        "partir dos Censos Demográficos, Contagens Populacionais ",
        "e Projeções Intercensitárias."
    ),
};

pub static PNI: DatabaseMetadata = DatabaseMetadata {
    long_name: "Sistema de Informações do Programa Nacional de Imunizações",
    source: &["https://datasus.saude.gov.br/acesso-a-informacao/doses-aplicadas-pni/"],
    description: concat!(
        "O SI-PNI é um sistema desenvolvido para possibilitar aos ",
        "gestores envolvidos no Programa Nacional de Imunização, a ",
        "avaliação dinâmica do risco quanto à ocorrência de surtos ou ",
        "epidemias, a partir do registro dos imunobiológicos aplicados e ",
        "do quantitativo populacional vacinado, agregados por faixa ",
        "etária, período de tempo e área geográfica."
    ),
};

pub static SIM: DatabaseMetadata = DatabaseMetadata {
    long_name: "Sistema de Informação sobre Mortalidade",
    source: &["http://sim.saude.gov.br"],
    description: concat!(
        "O Sistema de Informação sobre Mortalidade (SIM) coleta, processa ",
        "e disponibiliza as declarações de óbito registradas no Brasil, ",
        "incluindo idade, sexo, local de residência e causa básica do óbito."
    ),
};

pub static SINAN: DatabaseMetadata = DatabaseMetadata {
    long_name: "Doenças e Agravos de Notificação",
    source: &["https://portalsinan.saude.gov.br/"],
    description: concat!(
        "The Notifiable Diseases Information System (Sinan) is primarily ",
        "fed by the notification and investigation of cases of diseases ",
        "and conditions listed in the national list of compulsorily ",
        "notifiable diseases. States and municipalities are allowed to ",
        "include other important health problems in their region, such as ",
        "difilobotriasis in the municipality of São Paulo."
    ),
};

pub static SINASC: DatabaseMetadata = DatabaseMetadata {
    long_name: "Sistema de Informações sobre Nascidos Vivos",
    source: &["http://sinasc.saude.gov.br/"],
    description: "Dados sobre nascidos vivos no Brasil",
};

pub static TERRITORY: DatabaseMetadata = DatabaseMetadata {
    long_name: "Tabelas e Mapas Territoriais",
    source: &["ftp://ftp.datasus.gov.br/territorio"],
    description: concat!(
        "Tabelas de divisão territorial e arquivos de mapas usados pelo ",
        "TabWin para agregar os dados por município, região de saúde e UF."
    ),
};
