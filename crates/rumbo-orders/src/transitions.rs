//! The allowed-transition matrix.
//!
//! Any update whose `from → to` pair is not listed here is rejected without
//! mutating state. Terminal states have no outgoing edges.

use rumbo_core::OrderStatus;

use OrderStatus::{
    AsignadoConductor, BuscandoConductor, CanceladoConductor, CanceladoSistema, CanceladoUsuario,
    Completado, Confirmado, EnCaminoOrigen, EnDestino, EnOrigen, EnProcesoEmpresa, Entregado,
    ListoParaRecoger, ProblemaReportado, Solicitado, ViajeIniciado,
};

/// Permitted target statuses from `from`.
#[must_use]
pub fn allowed_targets(from: OrderStatus) -> &'static [OrderStatus] {
    match from {
        Solicitado => &[Confirmado, CanceladoUsuario, CanceladoSistema],
        Confirmado => &[
            BuscandoConductor,
            AsignadoConductor,
            EnProcesoEmpresa,
            ListoParaRecoger,
            CanceladoSistema,
            CanceladoUsuario,
        ],
        BuscandoConductor => &[AsignadoConductor, CanceladoSistema, Confirmado],
        AsignadoConductor => &[
            EnCaminoOrigen,
            CanceladoConductor,
            CanceladoSistema,
            CanceladoUsuario,
        ],
        EnProcesoEmpresa => &[ListoParaRecoger, CanceladoSistema],
        ListoParaRecoger => &[AsignadoConductor, BuscandoConductor, CanceladoSistema],
        EnCaminoOrigen => &[EnOrigen, CanceladoConductor],
        EnOrigen => &[ViajeIniciado, CanceladoConductor],
        ViajeIniciado => &[EnDestino, ProblemaReportado, CanceladoConductor],
        EnDestino => &[Entregado, Completado, ProblemaReportado],
        Entregado => &[Completado],
        ProblemaReportado => &[Completado, CanceladoSistema],
        Completado | CanceladoUsuario | CanceladoSistema | CanceladoConductor => &[],
    }
}

/// Whether `from → to` is an edge of the matrix.
#[must_use]
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_targets(from).contains(&to)
}

/// Whether a status has no outgoing edges.
#[must_use]
pub fn is_terminal(status: OrderStatus) -> bool {
    allowed_targets(status).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The matrix, written out edge by edge, as the source of truth for
    /// this test. Every pair not listed must be rejected.
    const EDGES: &[(OrderStatus, OrderStatus)] = &[
        (Solicitado, Confirmado),
        (Solicitado, CanceladoUsuario),
        (Solicitado, CanceladoSistema),
        (Confirmado, BuscandoConductor),
        (Confirmado, AsignadoConductor),
        (Confirmado, EnProcesoEmpresa),
        (Confirmado, ListoParaRecoger),
        (Confirmado, CanceladoSistema),
        (Confirmado, CanceladoUsuario),
        (BuscandoConductor, AsignadoConductor),
        (BuscandoConductor, CanceladoSistema),
        (BuscandoConductor, Confirmado),
        (AsignadoConductor, EnCaminoOrigen),
        (AsignadoConductor, CanceladoConductor),
        (AsignadoConductor, CanceladoSistema),
        (AsignadoConductor, CanceladoUsuario),
        (EnProcesoEmpresa, ListoParaRecoger),
        (EnProcesoEmpresa, CanceladoSistema),
        (ListoParaRecoger, AsignadoConductor),
        (ListoParaRecoger, BuscandoConductor),
        (ListoParaRecoger, CanceladoSistema),
        (EnCaminoOrigen, EnOrigen),
        (EnCaminoOrigen, CanceladoConductor),
        (EnOrigen, ViajeIniciado),
        (EnOrigen, CanceladoConductor),
        (ViajeIniciado, EnDestino),
        (ViajeIniciado, ProblemaReportado),
        (ViajeIniciado, CanceladoConductor),
        (EnDestino, Entregado),
        (EnDestino, Completado),
        (EnDestino, ProblemaReportado),
        (Entregado, Completado),
        (ProblemaReportado, Completado),
        (ProblemaReportado, CanceladoSistema),
    ];

    #[test]
    fn every_listed_edge_is_allowed() {
        for &(from, to) in EDGES {
            assert!(can_transition(from, to), "{from} -> {to} should be allowed");
        }
    }

    #[test]
    fn every_unlisted_pair_is_rejected() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let listed = EDGES.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    listed,
                    "{from} -> {to} disagrees with the edge list"
                );
            }
        }
    }

    #[test]
    fn terminals_have_no_outgoing_edges() {
        for status in [Completado, CanceladoUsuario, CanceladoSistema, CanceladoConductor] {
            assert!(is_terminal(status), "{status} should be terminal");
        }
        assert!(!is_terminal(Entregado));
        assert!(!is_terminal(ProblemaReportado));
    }

    #[test]
    fn self_transitions_are_never_edges() {
        for status in OrderStatus::ALL {
            assert!(!can_transition(status, status));
        }
    }
}
