pub mod payslip;
pub mod responses;

pub use payslip::{
    month_key, Benefit, EmployerInfo, EmploymentInfo, ExtractedPayslip, Extras, FinancialInfo,
    PayslipIdentifiers, PeriodInfo, PersonalInfo,
};
pub use responses::{
    AskResponse, BenefitChange, Citation, CompareAnswer, ComparisonResult, FieldChange,
    SectionView, SimilarPayslip,
};
